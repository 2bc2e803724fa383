pub mod cam;
pub mod classification;
pub mod colormap;
pub mod segmentation;

pub use cam::{class_activation_map, render_overlay};
pub use classification::{ClassificationReport, CategoryScore, Environment};
pub use segmentation::{render_prediction, LabelMap};
