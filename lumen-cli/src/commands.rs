// Subcommand handlers

use crate::InputArgs;
use lumen_eye::capture::CaptureSource;
use lumen_eye::display::DisplayWindow;
use lumen_eye::models::onnx::read_classifier_weights;
use lumen_eye::models::{profile_by_name, ModelProfile};
use lumen_eye::pipeline::{FrameSink, FrameSource};
use lumen_eye::{
    ClassifierVariant, ClassifyConfig, InferenceBackend, InputSource, ModelHandle, ModelManager,
    OrtBackend, SceneClassifier, SceneLabels, SceneSegmenter, SegmentConfig, SegmenterVariant,
    VideoSource, VisionConfig,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const CLASSIFY_INPUT: &str = "input.jpg";
const CLASSIFY_SAVEPATH: &str = "cam.jpg";
const SEGMENT_INPUT: &str = "test.png";
const SEGMENT_SAVEPATH: &str = "result.png";
const WINDOW_NAME: &str = "frame";

pub(crate) fn classify_config(
    vision: VisionConfig,
    variant: ClassifierVariant,
    args: InputArgs,
) -> anyhow::Result<ClassifyConfig> {
    let (source, savepath) = resolve_io(args.input, args.video, args.savepath, CLASSIFY_INPUT, CLASSIFY_SAVEPATH)?;
    Ok(ClassifyConfig {
        vision,
        variant,
        source,
        savepath,
        benchmark: args.benchmark,
    })
}

pub(crate) fn segment_config(
    vision: VisionConfig,
    arch: SegmenterVariant,
    smooth: bool,
    args: InputArgs,
) -> anyhow::Result<SegmentConfig> {
    let (source, savepath) = resolve_io(args.input, args.video, args.savepath, SEGMENT_INPUT, SEGMENT_SAVEPATH)?;
    Ok(SegmentConfig {
        vision,
        arch,
        source,
        savepath,
        benchmark: args.benchmark,
        smooth,
    })
}

fn resolve_io(
    input: Vec<PathBuf>,
    video: Option<VideoSource>,
    savepath: Option<PathBuf>,
    default_input: &str,
    default_savepath: &str,
) -> anyhow::Result<(InputSource, PathBuf)> {
    if video.is_some() {
        if let Some(path) = &savepath {
            warn!("Saving video output is not supported, {} will not be written", path.display());
        }
    }
    let input = if input.is_empty() { vec![PathBuf::from(default_input)] } else { input };
    let source = InputSource::resolve(&input, video)?;
    let savepath = savepath.unwrap_or_else(|| PathBuf::from(default_savepath));
    Ok((source, savepath))
}

/// Fetch the weights and load them into the configured backend
async fn load_model(
    vision: &Arc<VisionConfig>,
    profile: &ModelProfile,
) -> anyhow::Result<(Box<dyn ModelHandle>, PathBuf)> {
    let manager = ModelManager::new(vision.clone());
    let descriptor = manager.ensure_profile(profile).await?;
    let backend = OrtBackend::new(vision.execution_env()?);
    let handle = backend.load(&descriptor)?;
    info!("Loaded {} from {:?}", descriptor.name, descriptor.path);
    Ok((handle, descriptor.path))
}

pub async fn classify(config: ClassifyConfig) -> anyhow::Result<()> {
    let vision = Arc::new(config.vision);
    let (handle, weights_path) = load_model(&vision, &config.variant.profile()).await?;

    let auxiliary = config.variant.has_auxiliary_outputs();
    let labels = SceneLabels::load(&vision.resource_dir, auxiliary)?;
    let cam_weights = if auxiliary {
        Some(read_classifier_weights(&weights_path)?)
    } else {
        None
    };

    let mut classifier = SceneClassifier::new(handle, config.variant, labels, cam_weights)?
        .with_benchmark(config.benchmark);

    match &config.source {
        InputSource::Images(paths) => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            classifier.run_batch(paths, &config.savepath, &mut out)?;
        }
        InputSource::Stream(video) => {
            let (mut capture, mut window) = open_stream(video)?;
            let frames = classifier.run_stream(&mut capture, &mut window)?;
            info!("Processed {} frames", frames);
        }
    }

    info!("Script finished successfully.");
    Ok(())
}

pub async fn segment(config: SegmentConfig) -> anyhow::Result<()> {
    let vision = Arc::new(config.vision);
    let (handle, _) = load_model(&vision, &config.arch.profile()).await?;

    let mut segmenter = SceneSegmenter::new(handle, config.arch)
        .with_smoothing(config.smooth)
        .with_benchmark(config.benchmark);

    match &config.source {
        InputSource::Images(paths) => {
            segmenter.run_batch(paths, &config.savepath)?;
        }
        InputSource::Stream(video) => {
            let (mut capture, mut window) = open_stream(video)?;
            let frames = segmenter.run_stream(&mut capture, &mut window)?;
            info!("Processed {} frames", frames);
        }
    }

    info!("Script finished successfully.");
    Ok(())
}

fn open_stream(video: &VideoSource) -> anyhow::Result<(impl FrameSource, impl FrameSink)> {
    let capture = CaptureSource::open(video)?;
    let window = DisplayWindow::open(WINDOW_NAME)?;
    Ok((capture, window))
}

/// Every known model with `all`, otherwise the named ones
fn download_profiles(names: &[String], all: bool) -> anyhow::Result<Vec<ModelProfile>> {
    if all {
        return Ok(ClassifierVariant::ALL
            .iter()
            .map(|v| v.profile())
            .chain(SegmenterVariant::ALL.iter().map(|v| v.profile()))
            .collect());
    }
    if names.is_empty() {
        anyhow::bail!("Name at least one model, or pass --all");
    }
    Ok(names
        .iter()
        .map(|name| profile_by_name(name))
        .collect::<Result<Vec<_>, _>>()?)
}

pub async fn download(vision: VisionConfig, names: &[String], all: bool) -> anyhow::Result<()> {
    let profiles = download_profiles(names, all)?;
    let manager = ModelManager::new(Arc::new(vision));
    for profile in &profiles {
        let descriptor = manager.ensure_profile(profile).await?;
        println!("{} -> {}", profile.name, descriptor.path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(input: &[&str], video: Option<VideoSource>, savepath: Option<&str>) -> InputArgs {
        InputArgs {
            input: input.iter().map(PathBuf::from).collect(),
            video,
            savepath: savepath.map(PathBuf::from),
            benchmark: false,
        }
    }

    #[test]
    fn test_classify_default_savepath() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("room.jpg");
        fs::write(&image, b"x").unwrap();

        let config = classify_config(
            VisionConfig::default(),
            ClassifierVariant::Resnet18,
            args(&[image.to_str().unwrap()], None, None),
        )
        .unwrap();
        assert_eq!(config.source, InputSource::Images(vec![image]));
        assert_eq!(config.savepath, PathBuf::from("cam.jpg"));
    }

    #[test]
    fn test_segment_default_savepath() {
        let config = segment_config(
            VisionConfig::default(),
            SegmenterVariant::HrnetW18SmallV2,
            true,
            args(&[], Some(VideoSource::Camera(0)), None),
        )
        .unwrap();
        assert_eq!(config.savepath, PathBuf::from("result.png"));
        assert!(config.smooth);
    }

    #[test]
    fn test_default_inputs() {
        // the working directory holds neither default image
        let err = classify_config(VisionConfig::default(), ClassifierVariant::Resnet18, args(&[], None, None))
            .unwrap_err();
        assert!(err.to_string().contains("input.jpg"), "{}", err);

        let err = segment_config(
            VisionConfig::default(),
            SegmenterVariant::HrnetW48,
            false,
            args(&[], None, None),
        )
        .unwrap_err();
        assert!(err.to_string().contains("test.png"), "{}", err);
    }

    #[test]
    fn test_stream_mode_ignores_savepath() {
        let dir = TempDir::new().unwrap();
        let savepath = dir.path().join("out.mp4");
        let config = classify_config(
            VisionConfig::default(),
            ClassifierVariant::Resnet18,
            args(&["unused.jpg"], Some(VideoSource::File(PathBuf::from("clip.mp4"))), savepath.to_str()),
        )
        .unwrap();
        assert_eq!(config.source, InputSource::Stream(VideoSource::File(PathBuf::from("clip.mp4"))));
        assert_eq!(config.savepath, savepath);
        assert!(!savepath.exists());
    }

    #[test]
    fn test_download_profiles() {
        let all = download_profiles(&[], true).unwrap();
        assert_eq!(all.len(), ClassifierVariant::ALL.len() + SegmenterVariant::ALL.len());

        let names = vec!["wideresnet18".to_string(), "HRNetV2-W48".to_string()];
        let picked = download_profiles(&names, false).unwrap();
        let picked: Vec<&str> = picked.iter().map(|p| p.name).collect();
        assert_eq!(picked, vec!["wideresnet18", "HRNetV2-W48"]);

        assert!(download_profiles(&[], false).is_err());
        assert!(download_profiles(&["densenet161".to_string()], false).is_err());
    }

    #[tokio::test]
    async fn test_download_skips_cached_models() {
        let dir = TempDir::new().unwrap();
        let mut vision = VisionConfig::default();
        vision.model_dir = dir.path().to_path_buf();
        vision.places365_remote = "https://127.0.0.1:9/places365/".to_string();
        let profile = ClassifierVariant::Alexnet.profile();
        fs::write(dir.path().join(&profile.weight_file), b"cached").unwrap();

        download(vision, &["alexnet".to_string()], false).await.unwrap();
        assert_eq!(fs::read(dir.path().join(&profile.weight_file)).unwrap(), b"cached");
    }
}
