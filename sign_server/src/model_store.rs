//! One-time fetching and loading of the network.
//!
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use reqwest::Client;
use tokio::sync::OnceCell;

use crate::{
    nn::{InferModel, TrafficSignModel},
    utils::ensure_file,
    SignError,
};

pub type SharedModel = Arc<dyn InferModel>;

type LoadFn = Box<dyn Fn(&Path) -> Result<SharedModel, SignError> + Send + Sync>;

/// Where the model artifact comes from and where it is kept.
#[derive(Clone, Debug)]
pub struct ArtifactSource {
    pub url: String,
    pub path: PathBuf,
}

impl ArtifactSource {
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
        }
    }
}

/// Owner of the loaded network.
///
/// The first call to [`ModelStore::get`] downloads the artifact if needed and loads it, every
/// later call returns the same instance. A changed artifact on disk is not picked up.
pub struct ModelStore {
    source: ArtifactSource,
    client: Client,
    load_fn: LoadFn,
    model: OnceCell<SharedModel>,
}

impl ModelStore {
    /// Store loading a [`TrafficSignModel`].
    pub fn new(source: ArtifactSource) -> Self {
        Self::with_loader(source, |path| {
            let model = TrafficSignModel::load(path)?;
            Ok(Arc::new(model) as SharedModel)
        })
    }

    /// Store with a custom way of turning the artifact into a model.
    pub fn with_loader<F>(source: ArtifactSource, load_fn: F) -> Self
    where
        F: Fn(&Path) -> Result<SharedModel, SignError> + Send + Sync + 'static,
    {
        Self {
            source,
            client: Client::new(),
            load_fn: Box::new(load_fn),
            model: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &ArtifactSource {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Get the model, fetching and loading it on first use.
    ///
    /// A failed attempt leaves the store empty, so the next call retries the download.
    pub async fn get(&self) -> Result<SharedModel, SignError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                ensure_file(&self.client, &self.source.url, &self.source.path).await?;

                log::info!("Loading model from {}", self.source.path.display());
                let model = (self.load_fn)(&self.source.path)?;
                log::info!("Model loaded");

                Ok::<_, SignError>(model)
            })
            .await?;

        Ok(Arc::clone(model))
    }
}
