//! Error types for vb-pipeline

use thiserror::Error;

/// Which stage a job failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transcription,
    Summarization,
}

/// Classified pipeline failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("summarization failed: {0}")]
    SummarizationFailed(String),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::TranscriptionFailed(_) => FailureKind::Transcription,
            Self::SummarizationFailed(_) => FailureKind::Summarization,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PipelineError>;
