//! Stage contracts
//!
//! Each stage is a single remote transformation: audio to transcript, or
//! transcript to summary. Both carry the message id through unchanged as a
//! correlation id, and neither may produce an empty artifact.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Input to the transcription stage
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    /// Correlation id
    pub message_id: String,
    pub audio: Vec<u8>,
    /// MIME type hint for the audio payload
    pub mime_type: String,
}

/// Non-empty transcription result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub message_id: String,
    pub text: String,
}

impl Transcript {
    /// Build a transcript, rejecting blank text
    pub fn new(message_id: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::EmptyResult("transcript".to_string()));
        }
        Ok(Self {
            message_id: message_id.into(),
            text,
        })
    }
}

/// Input to the summarization stage
#[derive(Debug, Clone)]
pub struct SummarizationJob {
    /// Correlation id
    pub message_id: String,
    pub transcript: String,
}

/// Non-empty summarization result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub message_id: String,
    pub text: String,
}

impl Summary {
    /// Build a summary, rejecting blank text
    pub fn new(message_id: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::EmptyResult("summary".to_string()));
        }
        Ok(Self {
            message_id: message_id.into(),
            text,
        })
    }
}

/// Audio to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    async fn transcribe(&self, job: TranscriptionJob) -> Result<Transcript>;
}

/// Transcript to summary
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    async fn summarize(&self, job: SummarizationJob) -> Result<Summary>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_rejects_empty() {
        assert!(matches!(
            Transcript::new("m1", ""),
            Err(Error::EmptyResult(_))
        ));
        assert!(matches!(
            Transcript::new("m1", " \n\t"),
            Err(Error::EmptyResult(_))
        ));
    }

    #[test]
    fn test_transcript_keeps_text() {
        let transcript = Transcript::new("m1", "hello world").unwrap();
        assert_eq!(transcript.message_id, "m1");
        assert_eq!(transcript.text, "hello world");
    }

    #[test]
    fn test_summary_rejects_empty() {
        assert!(Summary::new("m1", "").is_err());
        assert_eq!(
            Summary::new("m1", "**Summary**: hi").unwrap().text,
            "**Summary**: hi"
        );
    }
}
