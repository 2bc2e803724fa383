//! Model variants and the fixed parameters each one carries

use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::preprocess::PreprocessRecipe;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Remote model family, each with its own download location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFamily {
    Places365,
    Hrnet,
}

impl ModelFamily {
    pub fn remote_base<'a>(&self, config: &'a VisionConfig) -> &'a str {
        match self {
            ModelFamily::Places365 => &config.places365_remote,
            ModelFamily::Hrnet => &config.hrnet_remote,
        }
    }
}

/// Everything the pipeline needs to know about a model, selected once per run
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProfile {
    pub name: &'static str,
    pub family: ModelFamily,
    pub weight_file: String,
    pub recipe: PreprocessRecipe,
    /// Number of output tensors the network returns
    pub output_arity: usize,
}

impl ModelProfile {
    pub fn url(&self, config: &VisionConfig) -> String {
        format!(
            "{}/{}",
            self.family.remote_base(config).trim_end_matches('/'),
            self.weight_file
        )
    }
}

/// Places365 scene classifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassifierVariant {
    Resnet18,
    Alexnet,
    Resnet50,
    WideResnet18,
}

impl ClassifierVariant {
    pub const ALL: [ClassifierVariant; 4] = [
        ClassifierVariant::Resnet18,
        ClassifierVariant::Alexnet,
        ClassifierVariant::Resnet50,
        ClassifierVariant::WideResnet18,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ClassifierVariant::Resnet18 => "resnet18",
            ClassifierVariant::Alexnet => "alexnet",
            ClassifierVariant::Resnet50 => "resnet50",
            ClassifierVariant::WideResnet18 => "wideresnet18",
        }
    }

    /// Variants that also expose feature maps for the environment vote,
    /// scene attributes and activation maps
    pub fn has_auxiliary_outputs(&self) -> bool {
        matches!(self, ClassifierVariant::WideResnet18)
    }

    pub fn profile(&self) -> ModelProfile {
        let recipe = if self.has_auxiliary_outputs() {
            PreprocessRecipe::places365_direct()
        } else {
            PreprocessRecipe::places365_center_crop()
        };
        ModelProfile {
            name: self.name(),
            family: ModelFamily::Places365,
            weight_file: format!("{}_places365.onnx", self.name()),
            recipe,
            output_arity: if self.has_auxiliary_outputs() { 3 } else { 1 },
        }
    }
}

impl Default for ClassifierVariant {
    fn default() -> Self {
        ClassifierVariant::Resnet18
    }
}

impl fmt::Display for ClassifierVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ClassifierVariant {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| invalid_choice(s, Self::ALL.iter().map(|v| v.name())))
    }
}

/// HRNetV2 semantic segmentation architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmenterVariant {
    HrnetW48,
    HrnetW18SmallV1,
    HrnetW18SmallV2,
}

impl SegmenterVariant {
    pub const ALL: [SegmenterVariant; 3] = [
        SegmenterVariant::HrnetW48,
        SegmenterVariant::HrnetW18SmallV1,
        SegmenterVariant::HrnetW18SmallV2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SegmenterVariant::HrnetW48 => "HRNetV2-W48",
            SegmenterVariant::HrnetW18SmallV1 => "HRNetV2-W18-Small-v1",
            SegmenterVariant::HrnetW18SmallV2 => "HRNetV2-W18-Small-v2",
        }
    }

    pub fn profile(&self) -> ModelProfile {
        ModelProfile {
            name: self.name(),
            family: ModelFamily::Hrnet,
            weight_file: format!("{}.onnx", self.name()),
            recipe: PreprocessRecipe::hrnet(),
            output_arity: 1,
        }
    }
}

impl Default for SegmenterVariant {
    fn default() -> Self {
        SegmenterVariant::HrnetW18SmallV2
    }
}

impl fmt::Display for SegmenterVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SegmenterVariant {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| invalid_choice(s, Self::ALL.iter().map(|v| v.name())))
    }
}

fn invalid_choice<'a>(value: &str, choices: impl Iterator<Item = &'a str>) -> VisionError {
    let choices: Vec<&str> = choices.collect();
    VisionError::Config(format!(
        "Invalid model name '{}' (choose from {})",
        value,
        choices.join(", ")
    ))
}

/// Look up any known variant by name
pub fn profile_by_name(name: &str) -> Result<ModelProfile, VisionError> {
    if let Ok(variant) = name.parse::<ClassifierVariant>() {
        return Ok(variant.profile());
    }
    if let Ok(variant) = name.parse::<SegmenterVariant>() {
        return Ok(variant.profile());
    }
    let known = ClassifierVariant::ALL
        .iter()
        .map(|v| v.name())
        .chain(SegmenterVariant::ALL.iter().map(|v| v.name()));
    Err(invalid_choice(name, known))
}
