//! Binary for downloading model weights from command line

use lumen_eye::config::VisionConfig;
use lumen_eye::error::VisionError;
use lumen_eye::models::{profile_by_name, ClassifierVariant, ModelManager, SegmenterVariant};
use std::env;
use std::sync::Arc;

fn available() -> String {
    ClassifierVariant::ALL
        .iter()
        .map(|v| v.name())
        .chain(SegmenterVariant::ALL.iter().map(|v| v.name()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), VisionError> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: download_model <model_name>...");
        eprintln!("Available models: {}", available());
        std::process::exit(1);
    }

    let config = VisionConfig::load(None)?;
    let manager = ModelManager::new(Arc::new(config));

    for name in &args[1..] {
        let profile = match profile_by_name(name) {
            Ok(profile) => profile,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        };
        println!("Downloading {}...", profile.name);
        let descriptor = manager.ensure_profile(&profile).await?;
        println!("{} downloaded to: {:?}", profile.name, descriptor.path);
    }

    Ok(())
}
