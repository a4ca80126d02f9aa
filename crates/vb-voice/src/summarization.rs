//! Summarization stage backed by Gemini

use async_trait::async_trait;
use tracing::info;
use vb_core::{
    Error, GeminiClient, GenerateContentRequest, Part, Result, SummarizationJob, Summarizer,
    Summary,
};

use crate::prompts::summary_prompt;

/// Headroom above the 150-word limit in the prompt
const MAX_SUMMARY_TOKENS: u32 = 1024;

/// Gemini summarization stage
pub struct GeminiSummarizer {
    client: GeminiClient,
}

impl GeminiSummarizer {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn summarize(&self, job: SummarizationJob) -> Result<Summary> {
        info!(message_id = %job.message_id, chars = job.transcript.chars().count(), "summarizing transcript");

        let request = GenerateContentRequest::new(vec![Part::text(summary_prompt(&job.transcript))])
            .max_output_tokens(MAX_SUMMARY_TOKENS);
        let response = self.client.generate_content(&request).await?;

        let text = response
            .text()
            .ok_or_else(|| Error::EmptyResult("summary".to_string()))?;

        info!(message_id = %job.message_id, chars = text.chars().count(), "summarization complete");
        Summary::new(job.message_id, text)
    }
}
