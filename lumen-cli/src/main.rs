// Lumen Command Line Interface
// Scene classification and semantic segmentation over images, cameras and videos

mod commands;

use clap::{Args, Parser, Subcommand};
use lumen_eye::{ClassifierVariant, SegmenterVariant, VideoSource, VisionConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lumen")]
#[command(about = "Lumen - scene classification and semantic segmentation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML or JSON)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the model weights
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Directory holding label tables
    #[arg(long, global = true)]
    resource_dir: Option<PathBuf>,

    /// Execution environment: 0 for CPU, n for CUDA device n-1
    #[arg(long, short, global = true)]
    env_id: Option<i32>,

    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Input images, directories of images, or file name patterns such as `imgs/*.jpg`
    #[arg(long, short, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Camera index or video file; switches to stream mode
    #[arg(long, short)]
    video: Option<VideoSource>,

    /// Output file, or a directory to name outputs after their inputs
    #[arg(long, short)]
    savepath: Option<PathBuf>,

    /// Run inference five times and log each duration
    #[arg(long, short)]
    benchmark: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Places365 scene classification
    Classify {
        #[command(flatten)]
        input: InputArgs,

        /// Classifier variant (resnet18, alexnet, resnet50, wideresnet18)
        #[arg(long, short, default_value = "resnet18")]
        model: ClassifierVariant,
    },

    /// HRNetV2 semantic segmentation
    Segment {
        #[command(flatten)]
        input: InputArgs,

        /// Architecture (HRNetV2-W48, HRNetV2-W18-Small-v1, HRNetV2-W18-Small-v2)
        #[arg(long, short, default_value = "HRNetV2-W18-Small-v2")]
        arch: SegmenterVariant,

        /// Upsample scores bilinearly before picking labels
        #[arg(long)]
        smooth: bool,
    },

    /// Fetch model weights ahead of time
    Download {
        /// Variant or architecture names
        models: Vec<String>,

        /// Fetch every known model
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let vision = resolve_config(&cli)?;

    let level = if cli.verbose { "debug" } else { vision.log_level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Classify { input, model } => {
            let config = commands::classify_config(vision, model, input)?;
            commands::classify(config).await?;
        }
        Commands::Segment { input, arch, smooth } => {
            let config = commands::segment_config(vision, arch, smooth, input)?;
            commands::segment(config).await?;
        }
        Commands::Download { models, all } => {
            commands::download(vision, &models, all).await?;
        }
    }

    Ok(())
}

/// Config file and environment first, then command line flags
fn resolve_config(cli: &Cli) -> anyhow::Result<VisionConfig> {
    let config = VisionConfig::load(cli.config.as_deref())?;
    apply_flags(config, cli)
}

fn apply_flags(mut config: VisionConfig, cli: &Cli) -> anyhow::Result<VisionConfig> {
    if let Some(dir) = &cli.model_dir {
        config.model_dir = dir.clone();
    }
    if let Some(dir) = &cli.resource_dir {
        config.resource_dir = dir.clone();
    }
    if let Some(env_id) = cli.env_id {
        config.env_id = env_id;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_defaults() {
        let cli = Cli::try_parse_from(["lumen", "classify"]).unwrap();
        match cli.command {
            Commands::Classify { input, model } => {
                assert_eq!(model, ClassifierVariant::Resnet18);
                assert!(input.input.is_empty());
                assert!(input.video.is_none());
                assert!(!input.benchmark);
            }
            _ => panic!("Expected classify"),
        }
    }

    #[test]
    fn test_segment_flags() {
        let cli = Cli::try_parse_from([
            "lumen", "segment", "-a", "HRNetV2-W48", "--smooth", "-v", "0", "-e", "1", "--verbose",
        ])
        .unwrap();
        assert_eq!(cli.env_id, Some(1));
        assert!(cli.verbose);
        match cli.command {
            Commands::Segment { input, arch, smooth } => {
                assert_eq!(arch, SegmenterVariant::HrnetW48);
                assert!(smooth);
                assert_eq!(input.video, Some(VideoSource::Camera(0)));
            }
            _ => panic!("Expected segment"),
        }
    }

    #[test]
    fn test_multiple_inputs() {
        let cli = Cli::try_parse_from(["lumen", "classify", "-i", "a.jpg", "b.jpg", "-s", "out"]).unwrap();
        match cli.command {
            Commands::Classify { input, .. } => {
                assert_eq!(input.input, vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")]);
                assert_eq!(input.savepath, Some(PathBuf::from("out")));
            }
            _ => panic!("Expected classify"),
        }
    }

    #[test]
    fn test_flags_override_file_and_environment() {
        let file = VisionConfig::from_str(
            "model_dir = \"/file/models\"\nresource_dir = \"/file/res\"\nlog_level = \"warn\"\n",
        )
        .unwrap();
        let from_env = file
            .with_vars(|key| match key {
                "LUMEN_RESOURCE_DIR" => Some("/env/res".to_string()),
                "LUMEN_ENV_ID" => Some("2".to_string()),
                _ => None,
            })
            .unwrap();

        let cli = Cli::try_parse_from(["lumen", "download", "--all", "--model-dir", "/cli/models", "-e", "0"])
            .unwrap();
        let config = apply_flags(from_env, &cli).unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/cli/models"));
        assert_eq!(config.resource_dir, PathBuf::from("/env/res"));
        assert_eq!(config.env_id, 0);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_flags_are_validated() {
        let cli = Cli::try_parse_from(["lumen", "download", "--all", "--env-id=-3"]).unwrap();
        assert!(apply_flags(VisionConfig::default(), &cli).is_err());
    }

    #[test]
    fn test_config_file_flag_is_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lumen.toml");
        std::fs::write(&path, "resource_dir = \"/srv/labels\"\n").unwrap();

        let cli = Cli::try_parse_from(["lumen", "-c", path.to_str().unwrap(), "download", "--all"]).unwrap();
        let file = VisionConfig::from_file(cli.config.as_deref().unwrap()).unwrap();
        let config = apply_flags(file, &cli).unwrap();
        assert_eq!(config.resource_dir, PathBuf::from("/srv/labels"));
        assert_eq!(config.model_dir, PathBuf::from("."));
    }

    #[test]
    fn test_invalid_model_rejected() {
        assert!(Cli::try_parse_from(["lumen", "classify", "--model", "densenet161"]).is_err());
    }
}
