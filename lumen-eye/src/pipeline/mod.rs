//! Batch and stream drivers for the inference pipelines
//!
//! A pipeline owns one loaded [`ModelHandle`](crate::backend::ModelHandle) and runs
//! preprocess → infer → postprocess for every input. Stream mode pulls frames from a
//! [`FrameSource`] and hands rendered frames to a [`FrameSink`] until either side
//! says stop.

pub mod classification;
pub mod segmentation;

use crate::error::VisionError;
use image::{DynamicImage, RgbImage};
use std::path::Path;
use tracing::{debug, warn};

pub use classification::{Classification, SceneClassifier};
pub use segmentation::SceneSegmenter;

/// Supplies frames for stream mode
pub trait FrameSource {
    /// `Ok(None)` once the source is exhausted
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, VisionError>;
}

/// Receives rendered frames in stream mode
pub trait FrameSink {
    /// Returns `false` when the user asked to stop
    fn present(&mut self, frame: &RgbImage) -> Result<bool, VisionError>;
}

/// Per-frame work done by a pipeline in stream mode
pub(crate) trait FrameProcessor {
    fn process_frame(&mut self, frame: &DynamicImage) -> Result<RgbImage, VisionError>;
}

/// Drive `processor` until the source runs dry or the sink asks to stop.
/// A failed frame read ends the loop; processing and display errors are fatal.
/// Returns the number of frames processed.
pub(crate) fn run_frames<P: FrameProcessor + ?Sized>(
    processor: &mut P,
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
) -> Result<usize, VisionError> {
    let mut frames = 0usize;
    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Frame source exhausted after {} frames", frames);
                break;
            }
            Err(e) => {
                warn!("Frame read failed, ending stream: {}", e);
                break;
            }
        };

        let rendered = processor.process_frame(&frame)?;
        frames += 1;
        if !sink.present(&rendered)? {
            debug!("Stream stopped by user after {} frames", frames);
            break;
        }
    }
    Ok(frames)
}

pub(crate) fn load_image(path: &Path) -> Result<DynamicImage, VisionError> {
    image::open(path).map_err(|e| {
        VisionError::Processing(format!("Failed to read image {:?}: {}", path, e))
    })
}
