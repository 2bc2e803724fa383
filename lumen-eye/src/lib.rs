//! lumen-eye: scene understanding inference pipelines
//!
//! Places365 scene classification (top categories, indoor/outdoor vote, scene
//! attributes and class activation maps) and HRNetV2 semantic segmentation over
//! still images, cameras or video files. Models are fetched on first use and run
//! through ONNX Runtime behind the [`backend::InferenceBackend`] seam.

pub mod backend;
pub mod capture;
pub mod config;
pub mod display;
pub mod error;
pub mod labels;
pub mod models;
pub mod npy;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod tensor;
mod utils;

pub use backend::{InferenceBackend, ModelDescriptor, ModelHandle, OrtBackend};
pub use config::{ClassifyConfig, ExecutionEnv, InputSource, SegmentConfig, VideoSource, VisionConfig};
pub use error::VisionError;
pub use labels::SceneLabels;
pub use models::{ClassifierVariant, ModelManager, SegmenterVariant};
pub use pipeline::{SceneClassifier, SceneSegmenter};
pub use tensor::Tensor;
