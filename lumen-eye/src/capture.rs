//! Camera and video file capture for stream mode

use crate::config::VideoSource;
use crate::error::VisionError;
use crate::pipeline::FrameSource;
use crate::utils::mat_to_image;
use image::DynamicImage;
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{VideoCapture, CAP_ANY},
};
use tracing::{info, warn};

/// OpenCV capture device, released on drop
pub struct CaptureSource {
    capture: VideoCapture,
    source: VideoSource,
}

impl CaptureSource {
    pub fn open(source: &VideoSource) -> Result<Self, VisionError> {
        let capture = match source {
            VideoSource::Camera(index) => VideoCapture::new(*index, CAP_ANY)
                .map_err(|e| VisionError::Capture(format!("Failed to open camera {}: {}", index, e)))?,
            VideoSource::File(path) => {
                let name = path.to_str().ok_or_else(|| {
                    VisionError::Capture(format!("Video path is not valid UTF-8: {:?}", path))
                })?;
                VideoCapture::from_file(name, CAP_ANY)
                    .map_err(|e| VisionError::Capture(format!("Failed to open video {:?}: {}", path, e)))?
            }
        };

        if !capture.is_opened()? {
            return Err(VisionError::Capture(format!("{} failed to open", describe(source))));
        }
        info!("{} opened", describe(source));
        Ok(Self { capture, source: source.clone() })
    }
}

impl FrameSource for CaptureSource {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, VisionError> {
        let mut frame = Mat::default();
        let grabbed = self
            .capture
            .read(&mut frame)
            .map_err(|e| VisionError::Capture(format!("Failed to read frame: {}", e)))?;
        if !grabbed || frame.empty() {
            return Ok(None);
        }
        Ok(Some(DynamicImage::ImageRgb8(mat_to_image(&frame)?)))
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!("Failed to release {}: {}", describe(&self.source), e);
        } else {
            info!("{} released", describe(&self.source));
        }
    }
}

fn describe(source: &VideoSource) -> String {
    match source {
        VideoSource::Camera(index) => format!("Camera {}", index),
        VideoSource::File(path) => format!("Video {:?}", path),
    }
}
