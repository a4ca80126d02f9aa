//! Linear pipeline state machine
//!
//! `Fetched -> Transcribed -> Summarized`, with any step able to move to
//! `Failed`. Summarization is only reachable from `Transcribed`, which can
//! only hold a non-empty [`Transcript`] whose correlation id matched.

use tracing::{debug, warn};
use vb_core::{
    Error, SummarizationJob, Summarizer, Summary, Transcriber, Transcript, TranscriptionJob,
};

use crate::error::PipelineError;

/// State of one job
#[derive(Debug)]
pub enum PipelineState {
    /// Audio loaded, ready for transcription
    Fetched(TranscriptionJob),
    Transcribed(Transcript),
    Summarized(Summary),
    Failed(PipelineError),
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fetched(_) => "fetched",
            Self::Transcribed(_) => "transcribed",
            Self::Summarized(_) => "summarized",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Summarized(_) | Self::Failed(_))
    }

    /// Advance one transition. Terminal states are returned unchanged.
    pub async fn step(self, transcriber: &dyn Transcriber, summarizer: &dyn Summarizer) -> Self {
        match self {
            Self::Fetched(job) => {
                let expected = job.message_id.clone();
                debug!(message_id = %expected, stage = transcriber.name(), "running transcription");

                match transcriber.transcribe(job).await.and_then(|t| check_correlation(&expected, t)) {
                    Ok(transcript) => Self::Transcribed(transcript),
                    Err(e) => {
                        warn!(message_id = %expected, "transcription failed: {}", e);
                        Self::Failed(PipelineError::TranscriptionFailed(e.to_string()))
                    }
                }
            }
            Self::Transcribed(transcript) => {
                let expected = transcript.message_id.clone();
                debug!(message_id = %expected, stage = summarizer.name(), "running summarization");

                let job = SummarizationJob {
                    message_id: transcript.message_id,
                    transcript: transcript.text,
                };

                match summarizer.summarize(job).await.and_then(|s| check_correlation(&expected, s)) {
                    Ok(summary) => Self::Summarized(summary),
                    Err(e) => {
                        warn!(message_id = %expected, "summarization failed: {}", e);
                        Self::Failed(PipelineError::SummarizationFailed(e.to_string()))
                    }
                }
            }
            terminal => terminal,
        }
    }
}

/// Artifacts that echo the correlation id of their job
trait Correlated {
    fn correlation_id(&self) -> &str;
}

impl Correlated for Transcript {
    fn correlation_id(&self) -> &str {
        &self.message_id
    }
}

impl Correlated for Summary {
    fn correlation_id(&self) -> &str {
        &self.message_id
    }
}

fn check_correlation<T: Correlated>(expected: &str, artifact: T) -> vb_core::Result<T> {
    if artifact.correlation_id() == expected {
        Ok(artifact)
    } else {
        Err(Error::CorrelationMismatch {
            expected: expected.to_string(),
            actual: artifact.correlation_id().to_string(),
        })
    }
}
