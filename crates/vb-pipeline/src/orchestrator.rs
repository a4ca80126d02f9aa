//! Voice message orchestrator
//!
//! Sequences the transcription and summarization stages for one job.
//! No retries: one failed stage call fails the job.

use std::sync::Arc;

use tracing::{info, warn};
use vb_core::{MediaHandle, Summarizer, Summary, Transcriber, TranscriptionJob};

use crate::error::{PipelineError, Result};
use crate::state::PipelineState;

/// One voice message to process
#[derive(Debug)]
pub struct ProcessRequest {
    pub sender_id: String,
    /// Also the correlation id threaded through both stages
    pub media_id: String,
    /// Ownership moves into the orchestrator, which releases it
    pub media: MediaHandle,
}

/// Runs the two-stage pipeline
#[derive(Clone)]
pub struct Orchestrator {
    transcriber: Arc<dyn Transcriber>,
    summarizer: Arc<dyn Summarizer>,
}

impl Orchestrator {
    pub fn new(transcriber: Arc<dyn Transcriber>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            transcriber,
            summarizer,
        }
    }

    /// Transcribe then summarize one voice message.
    ///
    /// The media handle is released before returning on every path. If the
    /// returned future is dropped early, the handle's `Drop` removes the file.
    pub async fn process_voice_message(&self, request: ProcessRequest) -> Result<Summary> {
        let ProcessRequest {
            sender_id,
            media_id,
            media,
        } = request;

        info!(sender = %sender_id, media_id = %media_id, "processing voice message");

        let outcome = self.run(&media_id, &media).await;

        if let Err(e) = media.release() {
            warn!(media_id = %media_id, "failed to delete temp media: {}", e);
        }

        match &outcome {
            Ok(summary) => info!(media_id = %media_id, chars = summary.text.chars().count(), "voice message processed"),
            Err(e) => warn!(media_id = %media_id, kind = ?e.kind(), "voice message failed: {}", e),
        }

        outcome
    }

    async fn run(&self, media_id: &str, media: &MediaHandle) -> Result<Summary> {
        let audio = media
            .read()
            .await
            .map_err(|e| PipelineError::TranscriptionFailed(format!("failed to read audio: {}", e)))?;

        let mut state = PipelineState::Fetched(TranscriptionJob {
            message_id: media_id.to_string(),
            audio,
            mime_type: media.mime_type().to_string(),
        });

        loop {
            state = match state {
                PipelineState::Summarized(summary) => return Ok(summary),
                PipelineState::Failed(e) => return Err(e),
                pending => {
                    pending
                        .step(self.transcriber.as_ref(), self.summarizer.as_ref())
                        .await
                }
            };
        }
    }
}
