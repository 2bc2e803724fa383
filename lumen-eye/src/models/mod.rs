//! Model variants, weight acquisition and ONNX weight extraction

pub mod manager;
pub mod onnx;
pub mod profile;

pub use manager::ModelManager;
pub use profile::{profile_by_name, ClassifierVariant, ModelFamily, ModelProfile, SegmenterVariant};
