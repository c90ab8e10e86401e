//! Traffic sign recognition server binary.
//!
use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use env_logger::TimestampPrecision;
use sign_server::{
    inferer::Inferer,
    model_store::{ArtifactSource, ModelStore},
    routes, DEFAULT_BODY_LIMIT, MODEL_PATH, MODEL_URL,
};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address to serve the HTTP application on
    #[clap(long, default_value = "127.0.0.1:3000")]
    server_address: String,

    /// URL the model is downloaded from if it is not present locally
    #[clap(long, default_value = MODEL_URL)]
    model_url: String,

    /// Local path of the model
    #[clap(long, default_value = MODEL_PATH)]
    model_path: PathBuf,

    /// Load the model on the first upload instead of at startup
    #[clap(long)]
    lazy_load: bool,

    /// Maximum size of an upload request in bytes
    #[clap(long, default_value_t = DEFAULT_BODY_LIMIT)]
    body_limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let store = Arc::new(ModelStore::new(ArtifactSource::new(
        args.model_url,
        args.model_path,
    )));

    // Fetching or loading problems stop the server before it accepts uploads
    if !args.lazy_load {
        store.get().await?;
    }

    let inferer = Arc::new(Inferer::new(store));
    let app = routes::app(inferer, args.body_limit);

    // Serve HTTP server
    let addr: SocketAddr = args.server_address.parse()?;
    log::info!("Serving on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
