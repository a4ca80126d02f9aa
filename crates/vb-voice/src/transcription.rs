//! Transcription stage backed by Gemini
//!
//! The audio is sent inline next to a fixed instruction; the first
//! candidate's text is the transcript.

use async_trait::async_trait;
use tracing::{debug, info};
use vb_core::{
    Error, GeminiClient, GenerateContentRequest, Part, Result, Transcriber, Transcript,
    TranscriptionJob,
};

use crate::prompts::TRANSCRIPTION_PROMPT;

/// Gemini transcription stage
pub struct GeminiTranscriber {
    client: GeminiClient,
}

impl GeminiTranscriber {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    fn request(job: &TranscriptionJob) -> GenerateContentRequest {
        GenerateContentRequest::new(vec![
            Part::inline(job.mime_type.clone(), &job.audio),
            Part::text(TRANSCRIPTION_PROMPT),
        ])
    }
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn transcribe(&self, job: TranscriptionJob) -> Result<Transcript> {
        info!(message_id = %job.message_id, bytes = job.audio.len(), "transcribing audio");
        debug!(model = self.client.model(), mime_type = %job.mime_type, "transcription request");

        let response = self.client.generate_content(&Self::request(&job)).await?;

        let text = response
            .text()
            .ok_or_else(|| Error::EmptyResult("transcript".to_string()))?;

        info!(message_id = %job.message_id, chars = text.chars().count(), "transcription complete");
        Transcript::new(job.message_id, text)
    }
}
