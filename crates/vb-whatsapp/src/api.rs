//! WhatsApp Graph API client
//!
//! Media retrieval (id -> short-lived URL -> bytes) and outbound text
//! replies, both bearer-token authenticated.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};
use vb_core::media::DEFAULT_AUDIO_MIME;
use vb_core::{TimeoutConfig, WhatsAppConfig};

use crate::error::{Result, WhatsAppError};
use crate::types::{MediaMetadata, SendMessagePayload};

/// Longest reply body sent; the platform rejects text over 4096 characters
pub const MAX_REPLY_CHARS: usize = 4000;

const TRUNCATION_SUFFIX: &str = "...(truncated)";

/// Largest media accepted; the platform caps audio at 16 MB
pub const MAX_MEDIA_BYTES: u64 = 16 * 1024 * 1024;

/// Downloaded audio bytes with their MIME type
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Outbound side of the messaging platform
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Resolve a media id and download its bytes
    async fn fetch_media(&self, media_id: &str) -> Result<DownloadedMedia>;

    /// Send a text message to `to`
    async fn send_text(&self, to: &str, body: &str) -> Result<()>;
}

/// Cut `text` to [`MAX_REPLY_CHARS`] on a char boundary
pub fn truncate_for_whatsapp(text: &str) -> String {
    if text.chars().count() <= MAX_REPLY_CHARS {
        return text.to_string();
    }
    let kept: String = text.chars().take(MAX_REPLY_CHARS).collect();
    format!("{}{}", kept, TRUNCATION_SUFFIX)
}

/// Drop MIME parameters such as `; codecs=opus`
fn mime_essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_AUDIO_MIME)
        .to_string()
}

/// Graph API client
///
/// Created once at startup; the inner `reqwest::Client` pools connections
/// and is shared by all deliveries.
#[derive(Clone)]
pub struct GraphApiClient {
    client: Client,
    api_token: String,
    phone_number_id: String,
    base_url: String,
    max_media_bytes: u64,
}

impl GraphApiClient {
    /// Create a new Graph API client
    pub fn new(config: &WhatsAppConfig, timeouts: &TimeoutConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect())
            .timeout(timeouts.request())
            .build()?;

        Ok(Self {
            client,
            api_token: config.api_token.clone(),
            phone_number_id: config.phone_number_id.clone(),
            base_url: config.graph_base_url.trim_end_matches('/').to_string(),
            max_media_bytes: MAX_MEDIA_BYTES,
        })
    }

    #[cfg(test)]
    fn with_max_media_bytes(mut self, max: u64) -> Self {
        self.max_media_bytes = max;
        self
    }

    fn too_large(&self, size: u64) -> WhatsAppError {
        WhatsAppError::MediaFetch(format!(
            "media too large: {} bytes (limit {})",
            size, self.max_media_bytes
        ))
    }

    /// Step 1: media id -> download URL
    async fn resolve_media(&self, media_id: &str) -> Result<MediaMetadata> {
        let url = format!("{}/{}", self.base_url, media_id);

        debug!(media_id, "resolving media url");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| WhatsAppError::MediaFetch(format!("media lookup request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WhatsAppError::MediaFetch(format!(
                "failed to get media url: {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| WhatsAppError::MediaFetch(format!("invalid media metadata: {}", e)))
    }

    /// Step 2: download URL -> bytes, stopping at the size limit
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| WhatsAppError::MediaFetch(format!("media download request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WhatsAppError::MediaFetch(format!(
                "failed to download media: {}",
                status
            )));
        }

        if let Some(len) = response.content_length().filter(|len| *len > self.max_media_bytes) {
            return Err(self.too_large(len));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| WhatsAppError::MediaFetch(format!("media download interrupted: {}", e)))?
        {
            let total = (bytes.len() + chunk.len()) as u64;
            if total > self.max_media_bytes {
                return Err(self.too_large(total));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(bytes)
    }
}

#[async_trait]
impl MessagingApi for GraphApiClient {
    async fn fetch_media(&self, media_id: &str) -> Result<DownloadedMedia> {
        let metadata = self.resolve_media(media_id).await?;
        if let Some(size) = metadata.file_size.filter(|size| *size > self.max_media_bytes) {
            return Err(self.too_large(size));
        }
        let bytes = self.download(&metadata.url).await?;

        let mime_type = metadata
            .mime_type
            .as_deref()
            .map(mime_essence)
            .unwrap_or_else(|| DEFAULT_AUDIO_MIME.to_string());

        info!(media_id, bytes = bytes.len(), mime_type = %mime_type, "downloaded media");

        Ok(DownloadedMedia { bytes, mime_type })
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        let text = truncate_for_whatsapp(body);

        info!("Sending WhatsApp message to {}", to);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&SendMessagePayload::text(to, &text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Send message failed: {} - {}", status, error_text);
            return Err(WhatsAppError::Api(format!(
                "failed to send reply: {} - {}",
                status, error_text
            )));
        }

        Ok(())
    }
}
