//! Gemini API HTTP client

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::{ModelConfig, TimeoutConfig};
use crate::error::{Error, Result};

use super::types::*;

/// Gemini `generateContent` client
///
/// Built once at startup and shared by the stages; cloning shares the
/// underlying connection pool.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a new client
    ///
    /// Model inference dominates pipeline latency, so requests are bounded
    /// by the pipeline deadline rather than the short request timeout.
    pub fn new(config: &ModelConfig, timeouts: &TimeoutConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect())
            .timeout(timeouts.pipeline())
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send a `generateContent` request
    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        debug!(model = %self.model, parts = request.contents.iter().map(|c| c.parts.len()).sum::<usize>(), "gemini request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Http)?;

        if !status.is_success() {
            warn!("Gemini API error: {} - {}", status, body);
            return Err(Error::ModelApi(format!("{}: {}", status, body)));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            Error::ModelApi(format!("Failed to parse response: {}", e))
        })?;

        info!(
            "Gemini API response: finish_reason={:?}, tokens={}",
            parsed.finish_reason(),
            parsed
                .usage_metadata
                .as_ref()
                .map(|u| u.candidates_token_count)
                .unwrap_or(0)
        );

        Ok(parsed)
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }
}
