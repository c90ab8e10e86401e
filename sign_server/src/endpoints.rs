//! Endpoints of HTTP server.
//!
use std::sync::Arc;

use axum::{
    extract::Multipart,
    response::{Html, IntoResponse, Response},
    Extension, Json,
};
use common::protocol::Prediction;

use crate::{
    inferer::{Inferer, Upload},
    page, SignError,
};

/// Name of the multipart field carrying the image.
pub const UPLOAD_FIELD: &str = "file";

/// Health check endpoint.
pub async fn healthcheck(Extension(inferer): Extension<Arc<Inferer>>) -> &'static str {
    match inferer.store().is_loaded() {
        true => "healthy",
        false => "healthy, model not loaded yet",
    }
}

/// Upload page.
pub async fn index() -> Html<String> {
    Html(page::index())
}

/// Classify an uploaded image and render the result page.
pub async fn upload_page(
    Extension(inferer): Extension<Arc<Inferer>>,
    multipart: Multipart,
) -> Result<Html<String>, PageError> {
    let upload = Arc::new(read_upload(multipart).await?);
    let prediction = inferer.classify(Arc::clone(&upload)).await?;

    Ok(Html(page::result(&upload, &prediction)))
}

/// Classify an uploaded image and answer with JSON.
pub async fn predict(
    Extension(inferer): Extension<Arc<Inferer>>,
    multipart: Multipart,
) -> Result<Json<Prediction>, SignError> {
    let upload = Arc::new(read_upload(multipart).await?);
    let prediction = inferer.classify(upload).await?;

    Ok(Json(prediction))
}

/// Take the image out of a multipart form.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, SignError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| SignError::Upload(err.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("unnamed").to_owned();
        let data = field
            .bytes()
            .await
            .map_err(|err| SignError::Upload(err.to_string()))?;
        log::debug!("Received {} ({} bytes)", file_name, data.len());

        return Upload::new(data.to_vec());
    }

    Err(SignError::MissingUpload)
}

/// Error rendered as the upload page with an error message.
#[derive(Debug)]
pub struct PageError(SignError);

impl From<SignError> for PageError {
    fn from(err: SignError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        log::warn!("Upload failed: {}", self.0);
        (self.0.status(), Html(page::error(&self.0.to_string()))).into_response()
    }
}
