//! Configuration for lumen-eye

use crate::error::VisionError;
use crate::models::{ClassifierVariant, SegmenterVariant};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub const PLACES365_REMOTE: &str = "https://storage.googleapis.com/ailia-models/places365/";
pub const HRNET_REMOTE: &str = "https://storage.googleapis.com/ailia-models/hrnet/";

/// File extensions picked up when an input directory is expanded
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// Execution environment for the inference runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionEnv {
    Cpu,
    Cuda { device_id: i32 },
}

impl ExecutionEnv {
    /// Map a numeric environment id: 0 is the CPU, `n` is CUDA device `n - 1`
    pub fn from_id(env_id: i32) -> Result<Self, VisionError> {
        match env_id {
            0 => Ok(ExecutionEnv::Cpu),
            n if n > 0 => Ok(ExecutionEnv::Cuda { device_id: n - 1 }),
            n => Err(VisionError::Config(format!("Invalid environment id: {}", n))),
        }
    }
}

/// Shared settings for every pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Directory holding downloaded weight files
    pub model_dir: PathBuf,
    /// Directory holding label tables and the attribute matrix
    pub resource_dir: PathBuf,
    /// Runtime environment id (see [`ExecutionEnv::from_id`])
    pub env_id: i32,
    /// Default tracing level when `RUST_LOG` is unset
    pub log_level: String,
    /// Base URL for Places365 classifier weights
    pub places365_remote: String,
    /// Base URL for HRNet segmentation weights
    pub hrnet_remote: String,
    /// Optional SHA-256 checksums keyed by weight file name
    pub checksums: HashMap<String, String>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("."),
            resource_dir: PathBuf::from("."),
            env_id: 0,
            log_level: "info".to_string(),
            places365_remote: PLACES365_REMOTE.to_string(),
            hrnet_remote: HRNET_REMOTE.to_string(),
            checksums: HashMap::new(),
        }
    }
}

impl VisionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), VisionError> {
        if self.model_dir.as_os_str().is_empty() {
            return Err(VisionError::Config("Model directory must not be empty".to_string()));
        }
        if self.resource_dir.as_os_str().is_empty() {
            return Err(VisionError::Config("Resource directory must not be empty".to_string()));
        }
        for remote in [&self.places365_remote, &self.hrnet_remote] {
            if !remote.starts_with("https://") {
                return Err(VisionError::Config(format!(
                    "Remote base URL must use HTTPS: {}",
                    remote
                )));
            }
        }
        for (name, checksum) in &self.checksums {
            if checksum.len() != 64 || !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(VisionError::Config(format!(
                    "Checksum for {} is not a SHA-256 hex digest",
                    name
                )));
            }
        }
        ExecutionEnv::from_id(self.env_id)?;
        Ok(())
    }

    pub fn execution_env(&self) -> Result<ExecutionEnv, VisionError> {
        ExecutionEnv::from_id(self.env_id)
    }

    pub fn checksum_for(&self, weight_file: &str) -> Option<&str> {
        self.checksums.get(weight_file).map(String::as_str)
    }

    /// Load configuration from a JSON or TOML file
    pub fn from_file(path: &Path) -> Result<Self, VisionError> {
        let content = fs::read_to_string(path).map_err(|e| {
            VisionError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_str(&content)
    }

    /// Load configuration from string
    pub fn from_str(content: &str) -> Result<Self, VisionError> {
        // Try JSON first
        if let Ok(config) = serde_json::from_str::<VisionConfig>(content) {
            return Ok(config);
        }

        toml::from_str::<VisionConfig>(content)
            .map_err(|e| VisionError::Config(format!("Unrecognized config format: {}", e)))
    }

    /// Overlay `LUMEN_*` environment variables
    pub fn with_env(self) -> Result<Self, VisionError> {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Overlay `LUMEN_*` settings looked up through `var`
    pub fn with_vars<F>(mut self, var: F) -> Result<Self, VisionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = var("LUMEN_MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("LUMEN_RESOURCE_DIR") {
            self.resource_dir = PathBuf::from(dir);
        }
        if let Some(env_id) = var("LUMEN_ENV_ID") {
            self.env_id = env_id.trim().parse::<i32>().map_err(|_| {
                VisionError::Config(format!("LUMEN_ENV_ID is not an integer: {}", env_id))
            })?;
        }
        if let Some(level) = var("LUMEN_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(self)
    }

    /// Resolve configuration: explicit file, then the user config file, then defaults,
    /// each overlaid with the environment
    pub fn load(explicit: Option<&Path>) -> Result<Self, VisionError> {
        let base = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_file().filter(|p| p.is_file()) {
                Some(path) => {
                    debug!("Using config file {:?}", path);
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };
        base.with_env()
    }

    /// `<config_dir>/lumen/config.toml`
    pub fn default_file() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("lumen");
            p.push("config.toml");
            p
        })
    }
}

/// Camera index or video file feeding stream mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    Camera(i32),
    File(PathBuf),
}

impl FromStr for VideoSource {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(VisionError::Config("Video source must not be empty".to_string()));
        }
        match s.parse::<i32>() {
            Ok(index) if index >= 0 => Ok(VideoSource::Camera(index)),
            Ok(index) => Err(VisionError::Config(format!("Invalid camera index: {}", index))),
            Err(_) => Ok(VideoSource::File(PathBuf::from(s))),
        }
    }
}

/// Where the pipeline reads its inputs from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Images(Vec<PathBuf>),
    Stream(VideoSource),
}

impl InputSource {
    /// Stream mode wins when a video source is given
    pub fn resolve(inputs: &[PathBuf], video: Option<VideoSource>) -> Result<Self, VisionError> {
        match video {
            Some(source) => Ok(InputSource::Stream(source)),
            None => Ok(InputSource::Images(expand_inputs(inputs)?)),
        }
    }
}

/// Expand directories and `*`/`?` file name patterns into image files, and check that
/// every plain file exists
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, VisionError> {
    if inputs.is_empty() {
        return Err(VisionError::Config("No input images given".to_string()));
    }

    let mut resolved = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = list_images(input, |_| true)?;
            if entries.is_empty() {
                return Err(VisionError::Config(format!("No images found in {:?}", input)));
            }
            resolved.extend(entries);
        } else if input.is_file() {
            resolved.push(input.clone());
        } else if let Some(pattern) = file_pattern(input) {
            let parent = match input.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            let entries = if parent.is_dir() {
                list_images(parent, |name| wildcard_match(pattern, name))?
            } else {
                Vec::new()
            };
            if entries.is_empty() {
                return Err(VisionError::Config(format!("No images match {:?}", input)));
            }
            resolved.extend(entries);
        } else {
            return Err(VisionError::Config(format!("Input not found: {:?}", input)));
        }
    }
    Ok(resolved)
}

/// Sorted image files in `dir` whose names pass `keep`
fn list_images<F>(dir: &Path, keep: F) -> Result<Vec<PathBuf>, VisionError>
where
    F: Fn(&str) -> bool,
{
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_image_extension(path))
        .filter(|path| path.file_name().and_then(|n| n.to_str()).map(&keep).unwrap_or(false))
        .collect();
    entries.sort();
    Ok(entries)
}

/// File name of `path` when it holds a wildcard
fn file_pattern(path: &Path) -> Option<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| name.contains(['*', '?']))
}

/// `*` matches any run of characters, `?` exactly one
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some(&c) if c == '?' || c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    n = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Output path for one input: a directory save path is joined with the input stem
/// and `ext`
pub fn resolve_save_path(savepath: &Path, input: &Path, ext: &str) -> PathBuf {
    if !savepath.is_dir() {
        return savepath.to_path_buf();
    }
    let mut name = input
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(".");
    name.push(ext);
    savepath.join(name)
}

/// Resolved options for a classification run
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    pub vision: VisionConfig,
    pub variant: ClassifierVariant,
    pub source: InputSource,
    pub savepath: PathBuf,
    pub benchmark: bool,
}

/// Resolved options for a segmentation run
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    pub vision: VisionConfig,
    pub arch: SegmenterVariant,
    pub source: InputSource,
    pub savepath: PathBuf,
    pub benchmark: bool,
    pub smooth: bool,
}
