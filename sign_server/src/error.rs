//! Error taxonomy of the recognition pipeline.
//!
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::ErrorMsg;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignError {
    /// The artifact could not be fetched from its remote location.
    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The host answered with a page instead of the file and no way around it was found.
    #[error("download of {0} returned an HTML page without a confirmation form")]
    ConfirmationPage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The artifact exists but is not a usable network.
    #[error("failed to load model: {0}")]
    Load(String),

    #[error("model produces {actual} outputs, but there are {expected} labels")]
    ClassCountMismatch { expected: usize, actual: usize },

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("unsupported image format {0}, expected JPEG or PNG")]
    UnsupportedFormat(String),

    #[error("no image found in upload")]
    MissingUpload,

    #[error("invalid upload: {0}")]
    Upload(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("class index {0} has no label")]
    UnknownClass(usize),
}

impl SignError {
    /// HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            SignError::Decode(_)
            | SignError::UnsupportedFormat(_)
            | SignError::MissingUpload
            | SignError::Upload(_) => StatusCode::BAD_REQUEST,
            SignError::Download { .. } | SignError::ConfirmationPage(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SignError {
    fn into_response(self) -> Response {
        let status = self.status();
        log::warn!("Request failed: {}", self);
        let body = Json(ErrorMsg {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_client_errors_are_bad_requests() {
        assert_eq!(SignError::MissingUpload.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            SignError::UnsupportedFormat("Gif".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SignError::UnknownClass(43).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
