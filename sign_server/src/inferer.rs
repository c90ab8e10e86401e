use std::{sync::Arc, time::Instant};

use common::protocol::Prediction;
use image::{ImageFormat, RgbImage};
use tokio::sync::Mutex;

use crate::{
    model_store::ModelStore,
    nn::{preprocess, InferModel},
    resolver::resolve,
    SignError,
};

/// An uploaded image that passed format detection.
#[derive(Debug)]
pub struct Upload {
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

impl Upload {
    /// Detect the format of raw upload bytes. Only JPEG and PNG are accepted.
    pub fn new(data: Vec<u8>) -> Result<Self, SignError> {
        if data.is_empty() {
            return Err(SignError::MissingUpload);
        }

        let format = image::guess_format(&data)?;
        match format {
            ImageFormat::Jpeg | ImageFormat::Png => Ok(Self { format, data }),
            other => Err(SignError::UnsupportedFormat(format!("{:?}", other))),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "image/png",
            _ => "image/jpeg",
        }
    }

    /// Decode into RGB pixels, dropping any alpha channel.
    pub fn decode(&self) -> Result<RgbImage, SignError> {
        let image = image::load_from_memory_with_format(&self.data, self.format)?;
        log::debug!(
            "Decoded {:?} image of {}x{}",
            self.format,
            image.width(),
            image.height()
        );

        Ok(image.to_rgb8())
    }
}

/// Runs uploads through decoding, preprocessing, the network and label resolution.
///
/// Only one upload is processed at a time.
pub struct Inferer {
    store: Arc<ModelStore>,
    run_lock: Mutex<()>,
}

impl Inferer {
    pub fn new(store: Arc<ModelStore>) -> Self {
        Self {
            store,
            run_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub async fn classify(&self, upload: Arc<Upload>) -> Result<Prediction, SignError> {
        let model = self.store.get().await?;

        let _guard = self.run_lock.lock().await;
        let start = Instant::now();

        let prediction =
            tokio::task::spawn_blocking(move || classify_image(model.as_ref(), &upload))
                .await
                .map_err(|err| SignError::Inference(err.to_string()))??;

        log::info!(
            "Predicted {} ({}) in {:.1} ms",
            prediction.label,
            prediction.confidence_text(),
            start.elapsed().as_secs_f32() * 1000.0
        );

        Ok(prediction)
    }
}

/// Synchronous pipeline for a single upload.
pub fn classify_image(model: &dyn InferModel, upload: &Upload) -> Result<Prediction, SignError> {
    let image = upload.decode()?;
    let input = preprocess(&image);
    let probabilities = model.run(&input)?;

    resolve(&probabilities)
}
