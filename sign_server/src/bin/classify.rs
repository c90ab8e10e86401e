//! Classify image files from the command line.
//!
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::TimestampPrecision;
use sign_server::{
    inferer::{classify_image, Upload},
    model_store::{ArtifactSource, ModelStore},
    MODEL_PATH, MODEL_URL,
};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// URL the model is downloaded from if it is not present locally
    #[clap(long, default_value = MODEL_URL)]
    model_url: String,

    /// Local path of the model
    #[clap(long, default_value = MODEL_PATH)]
    model_path: PathBuf,

    /// JPEG or PNG images to classify
    #[clap(required = true)]
    images: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let store = ModelStore::new(ArtifactSource::new(args.model_url, args.model_path));
    let model = store.get().await?;

    for path in args.images.iter() {
        let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let upload = Upload::new(data).with_context(|| format!("reading {}", path.display()))?;
        let prediction = classify_image(model.as_ref(), &upload)
            .with_context(|| format!("classifying {}", path.display()))?;

        println!(
            "{}: {} ({})",
            path.display(),
            prediction.label,
            prediction.confidence_text()
        );
    }

    Ok(())
}
