//! Places365 scene classification

use super::{load_image, run_frames, FrameProcessor, FrameSink, FrameSource};
use crate::backend::{infer_timed, ModelHandle};
use crate::config::resolve_save_path;
use crate::error::VisionError;
use crate::labels::SceneLabels;
use crate::models::{ClassifierVariant, ModelProfile};
use crate::postprocess::cam::{class_activation_map, render_overlay};
use crate::postprocess::classification::{
    rank_descending, softmax, top_attributes, vote_environment, CategoryScore,
    ClassificationReport, TOP_ATTRIBUTES, TOP_CATEGORIES,
};
use crate::preprocess::canonicalize;
use crate::tensor::Matrix;
use image::{DynamicImage, GrayImage, RgbImage};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Result of classifying one image
#[derive(Debug, Clone)]
pub struct Classification {
    pub report: ClassificationReport,
    /// Activation map of the top category, for variants with feature outputs
    pub cam: Option<GrayImage>,
}

impl Classification {
    /// Blend the activation map over `image`
    pub fn overlay(&self, image: &RgbImage) -> Option<RgbImage> {
        self.cam.as_ref().map(|cam| render_overlay(cam, image))
    }
}

pub struct SceneClassifier {
    handle: Box<dyn ModelHandle>,
    variant: ClassifierVariant,
    profile: ModelProfile,
    labels: SceneLabels,
    cam_weights: Option<Matrix>,
    benchmark: bool,
}

impl SceneClassifier {
    /// `cam_weights` is the `categories × channels` matrix of the final linear layer;
    /// it and the auxiliary label tables are required by variants with feature outputs
    pub fn new(
        handle: Box<dyn ModelHandle>,
        variant: ClassifierVariant,
        labels: SceneLabels,
        cam_weights: Option<Matrix>,
    ) -> Result<Self, VisionError> {
        if labels.categories.is_empty() {
            return Err(VisionError::Resource("No scene categories loaded".to_string()));
        }
        if variant.has_auxiliary_outputs() {
            if labels.environment.is_none() || labels.attributes.is_none() {
                return Err(VisionError::Resource(format!(
                    "{} needs the environment and attribute tables",
                    variant
                )));
            }
            let weights = cam_weights.as_ref().ok_or_else(|| {
                VisionError::Model(format!("{} needs classifier weights for activation maps", variant))
            })?;
            if weights.rows() != labels.categories.len() {
                return Err(VisionError::Model(format!(
                    "Classifier weights have {} rows for {} categories",
                    weights.rows(),
                    labels.categories.len()
                )));
            }
        }

        Ok(Self {
            handle,
            variant,
            profile: variant.profile(),
            labels,
            cam_weights,
            benchmark: false,
        })
    }

    pub fn with_benchmark(mut self, benchmark: bool) -> Self {
        self.benchmark = benchmark;
        self
    }

    /// Run the network on one image and build its report
    pub fn classify(&mut self, image: &DynamicImage) -> Result<Classification, VisionError> {
        let input = self.profile.recipe.apply(image)?;
        let outputs = infer_timed(
            self.handle.as_mut(),
            &input,
            self.profile.output_arity,
            self.benchmark,
        )?;

        let logits = outputs[0].data();
        if logits.len() != self.labels.categories.len() {
            return Err(VisionError::Inference(format!(
                "Classifier returned {} scores for {} categories",
                logits.len(),
                self.labels.categories.len()
            )));
        }
        let probabilities = softmax(logits)?;
        let ranking = rank_descending(&probabilities);

        let categories = ranking
            .iter()
            .take(TOP_CATEGORIES)
            .map(|r| CategoryScore {
                probability: r.score,
                label: self.labels.categories[r.index].clone(),
            })
            .collect();

        let mut report = ClassificationReport {
            environment: None,
            categories,
            attributes: Vec::new(),
        };
        let mut cam = None;

        if self.variant.has_auxiliary_outputs() {
            let (features, pooled) = (&outputs[1], &outputs[2]);
            if let Some(flags) = &self.labels.environment {
                report.environment = Some(vote_environment(flags, &ranking)?);
            }
            if let Some(table) = &self.labels.attributes {
                report.attributes = top_attributes(&table.weights, pooled.data(), TOP_ATTRIBUTES)?
                    .into_iter()
                    .map(|i| table.names[i].clone())
                    .collect();
            }
            if let (Some(weights), Some(top)) = (&self.cam_weights, ranking.first()) {
                let row = weights.row(top.index).ok_or_else(|| {
                    VisionError::Model(format!("No classifier weights for category {}", top.index))
                })?;
                cam = Some(class_activation_map(features, row)?);
            }
        }

        Ok(Classification { report, cam })
    }

    /// Classify every path in order, printing each report to `out`. Activation maps are
    /// saved under `savepath`; a directory save path yields one file per input.
    pub fn run_batch(
        &mut self,
        inputs: &[PathBuf],
        savepath: &Path,
        out: &mut dyn Write,
    ) -> Result<Vec<Classification>, VisionError> {
        let mut results = Vec::with_capacity(inputs.len());
        for path in inputs {
            info!("{}", path.display());
            let image = load_image(path)?;
            let result = self.classify(&image)?;

            info!("prediction on {}", path.display());
            write!(out, "{}", result.report)?;

            if let Some(overlay) = result.overlay(&canonicalize(&image)?) {
                let target = resolve_save_path(savepath, path, "jpg");
                overlay.save(&target)?;
                info!("Class activation map is saved as {}", target.display());
            }
            results.push(result);
        }
        Ok(results)
    }

    /// Classify frames until the source or sink stops; returns the frame count
    pub fn run_stream(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
    ) -> Result<usize, VisionError> {
        run_frames(self, source, sink)
    }
}

impl FrameProcessor for SceneClassifier {
    fn process_frame(&mut self, frame: &DynamicImage) -> Result<RgbImage, VisionError> {
        let result = self.classify(frame)?;
        if let Some(top) = result.report.categories.first() {
            info!("{:.3} -> {}", top.probability, top.label);
        }
        let rgb = canonicalize(frame)?;
        Ok(result.overlay(&rgb).unwrap_or(rgb))
    }
}
