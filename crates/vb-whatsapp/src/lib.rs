//! vb-whatsapp: WhatsApp Cloud API ingress for voicebrief
//!
//! Receives signed webhook deliveries, downloads voice notes through the
//! Graph API, hands them to the [`vb_pipeline::Orchestrator`], and replies
//! to the sender with the summary or a failure notice.

pub mod api;
pub mod error;
pub mod handler;
pub mod signature;
pub mod types;
pub mod webhook;

pub use api::{DownloadedMedia, GraphApiClient, MessagingApi};
pub use error::{Result, WhatsAppError};
pub use handler::{DeliveryReport, EventOutcome, MessageHandler};
pub use types::{InboundEvent, WebhookPayload};
pub use webhook::{WebhookState, create_webhook_router, start_webhook_server};
