//! Traffic sign recognition in the browser.
//!
//! A pre-trained GTSRB network (ONNX) is fetched once, loaded once and then used to classify
//! every image uploaded through the web page or the JSON endpoint.

pub mod endpoints;
pub mod error;
pub mod inferer;
pub mod model_store;
pub mod nn;
pub mod page;
pub mod resolver;
pub mod routes;
pub mod utils;

pub use error::SignError;

/// Shareable link of the pre-trained traffic sign network.
pub const MODEL_URL: &str = "https://drive.google.com/uc?id=1IsBhzfN6qzSHwfl-F7u6GCO6wRk533mj";

/// Local file the network is downloaded to and loaded from.
pub const MODEL_PATH: &str = "traffic_sign_cnn.onnx";

/// Default maximum size of an upload request in bytes.
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;
