//! Model acquisition tests: local cache hits, unreachable remotes, rejected requests

use lumen_eye::backend::{InferenceBackend, ModelDescriptor, ModelHandle};
use lumen_eye::config::VisionConfig;
use lumen_eye::error::VisionError;
use lumen_eye::models::{ClassifierVariant, ModelManager, ModelProfile, SegmenterVariant};
use mockall::mock;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

mock! {
    Backend {}
    impl InferenceBackend for Backend {
        fn load(&self, descriptor: &ModelDescriptor) -> Result<Box<dyn ModelHandle>, VisionError>;
    }
}

// nothing listens on the discard port
const UNREACHABLE: &str = "https://127.0.0.1:9/ailia-models/";

fn offline_config(dir: &TempDir) -> Arc<VisionConfig> {
    let mut config = VisionConfig::default();
    config.model_dir = dir.path().to_path_buf();
    config.places365_remote = format!("{}places365/", UNREACHABLE);
    config.hrnet_remote = format!("{}hrnet/", UNREACHABLE);
    Arc::new(config)
}

/// Acquire the weights, then hand them to the backend
async fn acquire_and_load(
    manager: &ModelManager,
    backend: &dyn InferenceBackend,
    profile: &ModelProfile,
) -> Result<Box<dyn ModelHandle>, VisionError> {
    let descriptor = manager.ensure_profile(profile).await?;
    backend.load(&descriptor)
}

#[tokio::test]
async fn test_existing_model_is_not_fetched() {
    let dir = TempDir::new().unwrap();
    let manager = ModelManager::new(offline_config(&dir));
    let profile = ClassifierVariant::Resnet18.profile();
    let path = dir.path().join(&profile.weight_file);
    fs::write(&path, b"cached weights").unwrap();

    // the remote is unreachable, so success means no request was made
    let descriptor = manager.ensure_profile(&profile).await.unwrap();
    assert_eq!(descriptor.path, path);
    assert_eq!(descriptor.output_arity, 1);
    assert_eq!(fs::read(&path).unwrap(), b"cached weights");

    let again = manager.ensure_profile(&profile).await.unwrap();
    assert_eq!(again, descriptor);
    assert_eq!(fs::read(&path).unwrap(), b"cached weights");
}

#[tokio::test]
async fn test_unreachable_remote_is_fatal_before_inference() {
    let dir = TempDir::new().unwrap();
    let manager = ModelManager::new(offline_config(&dir));
    let mut backend = MockBackend::new();
    backend.expect_load().times(0);

    let profile = SegmenterVariant::HrnetW18SmallV2.profile();
    let err = match acquire_and_load(&manager, &backend, &profile).await {
        Ok(_) => panic!("download from an unreachable host should fail"),
        Err(e) => e,
    };
    assert!(err.is_acquisition(), "unexpected error: {}", err);
    assert!(!dir.path().join(&profile.weight_file).exists());
}

#[tokio::test]
async fn test_cached_model_reaches_backend() {
    let dir = TempDir::new().unwrap();
    let manager = ModelManager::new(offline_config(&dir));
    let profile = ClassifierVariant::WideResnet18.profile();
    fs::write(dir.path().join(&profile.weight_file), b"weights").unwrap();

    let mut backend = MockBackend::new();
    backend
        .expect_load()
        .withf(|d| d.name == "wideresnet18" && d.output_arity == 3)
        .times(1)
        .returning(|d| Err(VisionError::Model(format!("refusing {}", d.name))));

    let err = match acquire_and_load(&manager, &backend, &profile).await {
        Ok(_) => panic!("mock backend refuses every model"),
        Err(e) => e,
    };
    assert!(!err.is_acquisition());
}

#[test]
fn test_plain_http_and_traversal_rejected() {
    let dir = TempDir::new().unwrap();
    let manager = ModelManager::new(offline_config(&dir));

    let err = tokio_test::block_on(manager.ensure_model(
        "model.onnx",
        "http://storage.googleapis.com/ailia-models/hrnet/model.onnx",
        None,
    ))
    .unwrap_err();
    assert!(matches!(err, VisionError::Model(_)));

    let err = tokio_test::block_on(manager.ensure_model(
        "../escape.onnx",
        "https://storage.googleapis.com/ailia-models/hrnet/escape.onnx",
        None,
    ))
    .unwrap_err();
    assert!(matches!(err, VisionError::Model(_)));
}

#[test]
fn test_model_dir_created_on_demand() {
    let dir = TempDir::new().unwrap();
    let mut config = VisionConfig::default();
    config.model_dir = dir.path().join("nested").join("models");
    let manager = ModelManager::new(Arc::new(config));

    let created = manager.ensure_model_dir().unwrap();
    assert!(created.is_dir());
}
