//! Error types for vb-whatsapp

use std::time::Duration;

use thiserror::Error;
use vb_pipeline::PipelineError;

/// vb-whatsapp error type
#[derive(Error, Debug)]
pub enum WhatsAppError {
    #[error("Missing webhook signature header")]
    MissingSignature,

    #[error("Webhook signature verification failed")]
    SignatureVerificationFailed,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Media download failed: {0}")]
    MediaFetch(String),

    #[error("Media storage failed: {0}")]
    Storage(String),

    #[error("Graph API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Pipeline deadline of {0:?} exceeded")]
    Timeout(Duration),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Webhook server error: {0}")]
    Server(String),
}

impl From<reqwest::Error> for WhatsAppError {
    fn from(err: reqwest::Error) -> Self {
        WhatsAppError::Http(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WhatsAppError>;
