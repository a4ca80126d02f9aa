//! Transcription stage backed by a Whisper-compatible API
//!
//! Works with any endpoint implementing `POST /audio/transcriptions`
//! (OpenAI, Groq, self-hosted servers).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use vb_core::media::extension_for_mime;
use vb_core::{Config, Error, Result, TimeoutConfig, Transcriber, Transcript, TranscriptionJob};

use crate::prompts::TRANSCRIPTION_PROMPT;

/// Configuration for the Whisper client
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub api_key: String,
    /// e.g. "whisper-1", "whisper-large-v3"
    pub model: String,
    pub base_url: String,
    /// ISO 639-1 language hint
    pub language: Option<String>,
}

impl WhisperConfig {
    /// Extract Whisper settings from the application config
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .transcription
            .whisper_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("WHISPER_API_KEY not set".to_string()))?;

        Ok(Self {
            api_key,
            model: config.transcription.whisper_model.clone(),
            base_url: config
                .transcription
                .whisper_base_url
                .trim_end_matches('/')
                .to_string(),
            language: config.transcription.language.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
    language: Option<String>,
}

/// Whisper transcription stage
pub struct WhisperTranscriber {
    client: Client,
    config: WhisperConfig,
}

impl WhisperTranscriber {
    pub fn new(config: WhisperConfig, timeouts: &TimeoutConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect())
            .timeout(timeouts.pipeline())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn form(&self, job: &TranscriptionJob) -> Result<reqwest::multipart::Form> {
        let filename = format!("{}.{}", job.message_id, extension_for_mime(&job.mime_type));
        let part = reqwest::multipart::Part::bytes(job.audio.clone())
            .file_name(filename)
            .mime_str(&job.mime_type)
            .map_err(|e| Error::ModelApi(format!("Failed to set mime type: {}", e)))?;

        let mut form = reqwest::multipart::Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "json")
            .text("prompt", TRANSCRIPTION_PROMPT)
            .part("file", part);

        if let Some(ref lang) = self.config.language {
            form = form.text("language", lang.clone());
        }

        Ok(form)
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    fn name(&self) -> &str {
        "whisper"
    }

    async fn transcribe(&self, job: TranscriptionJob) -> Result<Transcript> {
        let url = format!("{}/audio/transcriptions", self.config.base_url);

        info!(message_id = %job.message_id, bytes = job.audio.len(), "transcribing audio");
        debug!("Using model: {}", self.config.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .multipart(self.form(&job)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Whisper API error: {} - {}", status, error_text);
            return Err(Error::ModelApi(format!("{}: {}", status, error_text)));
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::ModelApi(format!("Failed to parse response: {}", e)))?;

        info!(
            message_id = %job.message_id,
            "Transcription complete: {} characters, language: {:?}",
            result.text.chars().count(),
            result.language
        );

        Transcript::new(job.message_id, result.text)
    }
}
