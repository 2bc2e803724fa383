//! HRNetV2 semantic segmentation

use super::{load_image, run_frames, FrameProcessor, FrameSink, FrameSource};
use crate::backend::{infer_timed, ModelHandle};
use crate::config::resolve_save_path;
use crate::error::VisionError;
use crate::models::{ModelProfile, SegmenterVariant};
use crate::postprocess::segmentation::render_prediction;
use image::{DynamicImage, RgbImage};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct SceneSegmenter {
    handle: Box<dyn ModelHandle>,
    profile: ModelProfile,
    smooth: bool,
    benchmark: bool,
}

impl SceneSegmenter {
    pub fn new(handle: Box<dyn ModelHandle>, variant: SegmenterVariant) -> Self {
        Self {
            handle,
            profile: variant.profile(),
            smooth: false,
            benchmark: false,
        }
    }

    pub fn with_smoothing(mut self, smooth: bool) -> Self {
        self.smooth = smooth;
        self
    }

    pub fn with_benchmark(mut self, benchmark: bool) -> Self {
        self.benchmark = benchmark;
        self
    }

    /// Colour-coded label image at the network input size
    pub fn segment(&mut self, image: &DynamicImage) -> Result<RgbImage, VisionError> {
        let input = self.profile.recipe.apply(image)?;
        let outputs = infer_timed(
            self.handle.as_mut(),
            &input,
            self.profile.output_arity,
            self.benchmark,
        )?;
        let (width, height) = self.profile.recipe.output_size();
        render_prediction(&outputs[0], width, height, self.smooth)
    }

    /// Segment every path in order and save each result under `savepath`.
    /// Returns the written files.
    pub fn run_batch(&mut self, inputs: &[PathBuf], savepath: &Path) -> Result<Vec<PathBuf>, VisionError> {
        let mut written = Vec::with_capacity(inputs.len());
        for path in inputs {
            info!("{}", path.display());
            let image = load_image(path)?;
            let rendered = self.segment(&image)?;
            let target = resolve_save_path(savepath, path, "png");
            rendered.save(&target)?;
            info!("saved at : {}", target.display());
            written.push(target);
        }
        Ok(written)
    }

    /// Segment frames until the source or sink stops; returns the frame count
    pub fn run_stream(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
    ) -> Result<usize, VisionError> {
        run_frames(self, source, sink)
    }
}

impl FrameProcessor for SceneSegmenter {
    fn process_frame(&mut self, frame: &DynamicImage) -> Result<RgbImage, VisionError> {
        self.segment(frame)
    }
}
