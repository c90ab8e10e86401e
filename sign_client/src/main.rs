//! Send images to a running sign server and print the predictions.
//!
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use common::protocol::{ErrorMsg, Prediction};
use env_logger::TimestampPrecision;
use reqwest::{multipart, Client};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Base URL of the sign server
    #[clap(long, default_value = "http://127.0.0.1:3000")]
    server_url: String,

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

    let client = Client::new();
    let url = format!("{}/predict", args.server_url.trim_end_matches('/'));

    send_all(&client, &url, &args.images).await
}

/// Send every image, printing each prediction. Fails if any image failed.
async fn send_all(client: &Client, url: &str, images: &[PathBuf]) -> Result<()> {
    let mut failed = 0;
    for path in images.iter() {
        match send_image(client, url, path).await {
            Ok(prediction) => println!(
                "{}: {} ({})",
                path.display(),
                prediction.label,
                prediction.confidence_text()
            ),
            Err(err) => {
                log::error!("{}: {:#}", path.display(), err);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} images failed", failed, images.len());
    }

    Ok(())
}

async fn send_image(client: &Client, url: &str, path: &Path) -> Result<Prediction> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    log::debug!("Sending {} bytes of {}", data.len(), path.display());

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".into());
    let part = multipart::Part::bytes(data)
        .file_name(file_name)
        .mime_str(mime_type(path))?;
    let form = multipart::Form::new().part("file", part);

    let resp = client.post(url).multipart(form).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let msg = resp
            .json::<ErrorMsg>()
            .await
            .map(|msg| msg.error)
            .unwrap_or_else(|_| status.to_string());
        bail!("server answered {}: {}", status, msg);
    }

    Ok(resp.json::<Prediction>().await?)
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
