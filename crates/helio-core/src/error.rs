//! Error taxonomy for the analytics layer.
//!
//! `InsufficientFeatures` is recoverable: the anomaly scorer and the health
//! classifier turn it into a pass-through / empty report. Everything else is
//! surfaced to the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Fewer usable feature columns than the computation needs
    #[error("insufficient features: {available:?} available, at least {required} required")]
    InsufficientFeatures {
        available: Vec<String>,
        required: usize,
    },

    #[error("training data is empty")]
    EmptyTrainingData,

    #[error("training failed: {0}")]
    TrainingFailed(String),

    /// No model has been trained or persisted yet
    #[error("prediction model is not available")]
    ModelUnavailable,

    /// A numeric feature held a value the computation cannot use (infinite)
    #[error("malformed value {value} in column `{column}` at row {row}")]
    MalformedInput {
        column: String,
        row: usize,
        value: f64,
    },

    #[error("model persistence error: {0}")]
    Persistence(String),

    #[error("unsupported model artifact version: {found} (max supported: {max_supported})")]
    UnsupportedArtifactVersion { found: u32, max_supported: u32 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;

impl From<bincode::Error> for AnalyticsError {
    fn from(err: bincode::Error) -> Self {
        AnalyticsError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        AnalyticsError::Config(err.to_string())
    }
}
