use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};

use crate::{
    endpoints::{healthcheck, index, predict, upload_page},
    inferer::Inferer,
};

/// Build the HTTP application.
pub fn app(inferer: Arc<Inferer>, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(index).post(upload_page))
        .route("/predict", post(predict))
        .route("/healthcheck", get(healthcheck))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(inferer))
}
