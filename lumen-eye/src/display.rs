//! Live preview window for stream mode

use crate::error::VisionError;
use crate::pipeline::FrameSink;
use crate::utils::image_to_mat;
use image::RgbImage;
use opencv::highgui;
use tracing::warn;

/// HighGUI window; closing it or pressing `q` stops the stream
pub struct DisplayWindow {
    name: String,
}

impl DisplayWindow {
    pub fn open(name: &str) -> Result<Self, VisionError> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self { name: name.to_string() })
    }
}

impl FrameSink for DisplayWindow {
    fn present(&mut self, frame: &RgbImage) -> Result<bool, VisionError> {
        highgui::imshow(&self.name, &image_to_mat(frame)?)?;
        let key = highgui::wait_key(1)?;
        if key & 0xFF == 'q' as i32 {
            return Ok(false);
        }
        let visible = highgui::get_window_property(&self.name, highgui::WND_PROP_VISIBLE)?;
        Ok(visible >= 1.0)
    }
}

impl Drop for DisplayWindow {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_window(&self.name) {
            warn!("Failed to close window {}: {}", self.name, e);
        }
    }
}
