//! Error types for vb-core

use thiserror::Error;

/// Main error type for vb-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model API error: {0}")]
    ModelApi(String),

    #[error("Model returned an empty {0}")]
    EmptyResult(String),

    #[error("Correlation id mismatch: expected {expected}, got {actual}")]
    CorrelationMismatch { expected: String, actual: String },
}

/// Result type alias for vb-core
pub type Result<T> = std::result::Result<T, Error>;
