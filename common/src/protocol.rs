//! Wire format of the JSON prediction endpoint.
//!
use serde::{Deserialize, Serialize};

/// Resolved prediction for one uploaded image.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Prediction {
    /// Arg-max class index.
    pub class_id: usize,
    /// Display name of `class_id`.
    pub label: String,
    /// Probability of `class_id` in percent, rounded to two decimals.
    pub confidence: f64,
}

impl Prediction {
    /// Confidence formatted for display, e.g. `97.31%`.
    pub fn confidence_text(&self) -> String {
        format!("{:.2}%", self.confidence)
    }
}

/// Body returned by the server when a request fails.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ErrorMsg {
    pub error: String,
}
