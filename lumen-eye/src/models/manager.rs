//! Model manager with auto-download functionality

use crate::backend::ModelDescriptor;
use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::models::ModelProfile;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const MAX_MODEL_SIZE: usize = 2_000_000_000; // 2GB max
const MIN_MODEL_SIZE: usize = 1024;
const DOWNLOAD_TIMEOUT_SECS: u64 = 3600; // 1 hour max

/// Makes sure weight files exist locally, fetching them when missing
pub struct ModelManager {
    config: Arc<VisionConfig>,
}

impl ModelManager {
    /// Create a new model manager
    pub fn new(config: Arc<VisionConfig>) -> Self {
        Self { config }
    }

    /// Ensure model directory exists
    pub fn ensure_model_dir(&self) -> Result<PathBuf, VisionError> {
        let model_dir = &self.config.model_dir;
        if !model_dir.exists() {
            fs::create_dir_all(model_dir).map_err(|e| {
                VisionError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create model directory: {}", e),
                ))
            })?;
            info!("Created model directory: {:?}", model_dir);
        }
        Ok(model_dir.clone())
    }

    /// Fetch the weights for `profile` if needed and describe the local copy
    pub async fn ensure_profile(&self, profile: &ModelProfile) -> Result<ModelDescriptor, VisionError> {
        let url = profile.url(&self.config);
        let checksum = self.config.checksum_for(&profile.weight_file);
        let path = self.ensure_model(&profile.weight_file, &url, checksum).await?;
        Ok(ModelDescriptor {
            name: profile.name.to_string(),
            path,
            output_arity: profile.output_arity,
        })
    }

    /// Download model if not present
    pub async fn ensure_model(
        &self,
        model_name: &str,
        url: &str,
        checksum: Option<&str>,
    ) -> Result<PathBuf, VisionError> {
        // Validate model name to prevent path traversal
        if model_name.is_empty() || model_name.len() > 255 {
            return Err(VisionError::Model("Invalid model name".to_string()));
        }
        if model_name.contains("..") || model_name.contains('/') || model_name.contains('\\') {
            return Err(VisionError::Model("Model name contains invalid characters".to_string()));
        }

        if url.is_empty() || url.len() > 2048 {
            return Err(VisionError::Model("Invalid URL".to_string()));
        }
        if !url.starts_with("https://") {
            return Err(VisionError::Model(
                "Only HTTPS URLs are allowed for model downloads".to_string(),
            ));
        }

        self.ensure_model_dir()?;

        let model_path = self.config.model_dir.join(model_name);

        if model_path.exists() {
            debug!("Model {} already exists at {:?}", model_name, model_path);
            return Ok(model_path);
        }

        info!("Downloading model {} from {}", model_name, url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;

        let response = client.get(url).send().await.map_err(|e| {
            VisionError::Download(format!("Failed to fetch {}: {}", url, e))
        })?;

        if !response.status().is_success() {
            return Err(VisionError::Download(format!(
                "Failed to download {}: HTTP {}",
                model_name,
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_MODEL_SIZE as u64 {
                return Err(VisionError::Download(format!(
                    "Model too large: {} bytes (max {} bytes)",
                    content_length, MAX_MODEL_SIZE
                )));
            }
        }

        let bytes = response.bytes().await.map_err(|e| {
            VisionError::Download(format!("Failed to read body of {}: {}", url, e))
        })?;

        if bytes.len() > MAX_MODEL_SIZE {
            return Err(VisionError::Download(format!(
                "Downloaded model too large: {} bytes (max {} bytes)",
                bytes.len(),
                MAX_MODEL_SIZE
            )));
        }
        if bytes.len() < MIN_MODEL_SIZE {
            return Err(VisionError::Download(
                "Downloaded file too small, likely corrupted".to_string(),
            ));
        }

        match checksum {
            Some(expected) => {
                verify_checksum(model_name, &bytes, expected)?;
                info!("Verified checksum for model {}", model_name);
            }
            None => info!(
                "Downloaded {} bytes for model {} (checksum verification skipped)",
                bytes.len(),
                model_name
            ),
        }

        write_atomically(&model_path, &bytes)?;

        info!("Model {} saved to {:?}", model_name, model_path);
        Ok(model_path)
    }
}

fn verify_checksum(model_name: &str, bytes: &[u8], expected: &str) -> Result<(), VisionError> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let computed = hex::encode(hasher.finalize());
    if !computed.eq_ignore_ascii_case(expected) {
        return Err(VisionError::Download(format!(
            "Checksum mismatch for model {}: expected {}, got {}",
            model_name, expected, computed
        )));
    }
    Ok(())
}

/// Write to a temp sibling, then rename over the target
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), VisionError> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, bytes).map_err(|e| {
        VisionError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to write model file: {}", e),
        ))
    })?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        VisionError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to rename model file: {}", e),
        ))
    })
}
