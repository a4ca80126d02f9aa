//! WhatsApp Cloud API webhook and Graph API types

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Message type that triggers the pipeline
pub const AUDIO_KIND: &str = "audio";

/// Webhook delivery body: entries -> changes -> messages
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: ChangeValue,
}

/// Status callbacks carry no `messages` and parse to an empty list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMessage {
    /// Sender WhatsApp id (phone number)
    pub from: String,
    /// `wamid.*` message id
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub audio: Option<AudioMedia>,
}

/// Only the id is used; the MIME type comes from the media lookup
#[derive(Debug, Clone, Deserialize)]
pub struct AudioMedia {
    pub id: String,
}

/// One parsed inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender_id: String,
    pub message_id: String,
    pub kind: String,
    pub media_id: Option<String>,
}

impl InboundEvent {
    /// Audio message with a media id to fetch
    pub fn is_actionable(&self) -> bool {
        self.kind == AUDIO_KIND && self.media_id.is_some()
    }
}

impl From<WebhookMessage> for InboundEvent {
    fn from(msg: WebhookMessage) -> Self {
        Self {
            sender_id: msg.from,
            message_id: msg.id,
            kind: msg.message_type,
            media_id: msg.audio.map(|a| a.id),
        }
    }
}

impl WebhookPayload {
    /// All messages in delivery order
    pub fn into_events(self) -> Vec<InboundEvent> {
        self.entry
            .into_iter()
            .flat_map(|entry| entry.changes)
            .flat_map(|change| change.value.messages)
            .map(InboundEvent::from)
            .collect()
    }

    /// Messages the pipeline acts on; everything else is dropped here
    pub fn into_audio_events(self) -> Vec<InboundEvent> {
        self.into_events()
            .into_iter()
            .filter(|event| {
                if event.is_actionable() {
                    return true;
                }
                if event.kind == AUDIO_KIND {
                    debug!(message_id = %event.message_id, "audio message without media id, skipping");
                } else {
                    debug!(message_id = %event.message_id, kind = %event.kind, "ignoring non-audio message");
                }
                false
            })
            .collect()
    }
}

/// Subscription handshake query (`GET /webhook`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
}

/// `GET /{media_id}` response
#[derive(Debug, Clone, Deserialize)]
pub struct MediaMetadata {
    /// Short-lived download URL
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// `POST /{phone_number_id}/messages` body
#[derive(Debug, Clone, Serialize)]
pub struct SendMessagePayload<'a> {
    pub messaging_product: &'static str,
    pub to: &'a str,
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub text: TextBody<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextBody<'a> {
    pub body: &'a str,
}

impl<'a> SendMessagePayload<'a> {
    pub fn text(to: &'a str, body: &'a str) -> Self {
        Self {
            messaging_product: "whatsapp",
            to,
            message_type: "text",
            text: TextBody { body },
        }
    }
}
