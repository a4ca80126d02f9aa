//! Webhook server for the WhatsApp Cloud API
//!
//! `GET /webhook` answers the subscription handshake, `POST /webhook`
//! receives signed deliveries.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use tracing::{error, info, warn};

use crate::error::{Result, WhatsAppError};
use crate::handler::MessageHandler;
use crate::signature::{SIGNATURE_HEADER, verify_signature, verify_token_matches};
use crate::types::{VerifyQuery, WebhookPayload};

const SUBSCRIBE_MODE: &str = "subscribe";

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub verify_token: String,
    pub app_secret: String,
    pub handler: Arc<MessageHandler>,
}

/// Create webhook router
pub fn create_webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify_subscription).post(handle_webhook))
        .route("/health", get(health))
        .with_state(Arc::new(state))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Subscription handshake: echo the challenge when the token matches
async fn verify_subscription(
    State(state): State<Arc<WebhookState>>,
    Query(query): Query<VerifyQuery>,
) -> std::result::Result<String, StatusCode> {
    let mode_ok = query.mode.as_deref() == Some(SUBSCRIBE_MODE);
    let token_ok = query
        .verify_token
        .as_deref()
        .is_some_and(|t| verify_token_matches(&state.verify_token, t));

    match query.challenge {
        Some(challenge) if mode_ok && token_ok => {
            info!("Webhook subscription verified");
            Ok(challenge)
        }
        _ => {
            warn!(mode = ?query.mode, "Webhook verification rejected");
            Err(StatusCode::FORBIDDEN)
        }
    }
}

/// Handle a signed delivery
async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<StatusCode, StatusCode> {
    authenticate(&state.app_secret, &headers, &body).map_err(|e| {
        warn!("Rejected webhook delivery: {}", e);
        StatusCode::FORBIDDEN
    })?;

    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        error!("Failed to parse webhook body: {}", e);
        StatusCode::BAD_REQUEST
    })?;

    let events = payload.into_audio_events();
    if events.is_empty() {
        return Ok(StatusCode::OK);
    }

    // Per-event failures were already turned into notices; always acknowledge
    let report = state.handler.handle_delivery(events).await;
    info!(delivery_id = %report.delivery_id, events = report.outcomes.len(), "Webhook delivery acknowledged");

    Ok(StatusCode::OK)
}

fn authenticate(app_secret: &str, headers: &HeaderMap, body: &[u8]) -> Result<()> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WhatsAppError::MissingSignature)?;

    verify_signature(app_secret, body, signature)
}

/// Serve the webhook router on `0.0.0.0:{port}` until `shutdown` resolves
pub async fn start_webhook_server<F>(state: WebhookState, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_webhook_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WhatsAppError::Server(format!("failed to bind {}: {}", addr, e)))?;

    info!("WhatsApp webhook server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| WhatsAppError::Server(e.to_string()))?;

    info!("WhatsApp webhook server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::tests::{FakeApi, FakeSummarizer, FakeTranscriber, handler};
    use crate::handler::{DOWNLOAD_FAILED_NOTICE, PROCESS_FAILED_NOTICE};
    use crate::signature::sign;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    const SECRET: &str = "app_secret";
    const VERIFY_TOKEN: &str = "verify-me";

    const ONE_AUDIO: &str = r#"{"object":"whatsapp_business_account","entry":[{"id":"1","changes":[{"field":"messages","value":{"messages":[{"from":"15551234567","id":"wamid.1","type":"audio","audio":{"id":"m1","mime_type":"audio/ogg"}}]}}]}]}"#;

    struct Harness {
        router: Router,
        api: Arc<FakeApi>,
        summarizer: Arc<FakeSummarizer>,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        harness_with(FakeApi::default(), FakeTranscriber::default())
    }

    fn harness_with(api: FakeApi, transcriber: FakeTranscriber) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(api);
        let summarizer = Arc::new(FakeSummarizer::default());
        let handler = handler(api.clone(), Arc::new(transcriber), summarizer.clone(), &dir);
        let router = create_webhook_router(WebhookState {
            verify_token: VERIFY_TOKEN.to_string(),
            app_secret: SECRET.to_string(),
            handler: Arc::new(handler),
        });
        Harness {
            router,
            api,
            summarizer,
            _dir: dir,
        }
    }

    /// Signed-delivery body with one audio message per media id
    fn audio_delivery(media_ids: &[&str]) -> String {
        let messages: Vec<_> = media_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                serde_json::json!({
                    "from": format!("1555000000{}", i),
                    "id": format!("wamid.{}", id),
                    "type": "audio",
                    "audio": {"id": id, "mime_type": "audio/ogg"}
                })
            })
            .collect();
        serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{"id": "1", "changes": [{"field": "messages", "value": {"messages": messages}}]}]
        })
        .to_string()
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn delivery(body: &str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_verification_echoes_challenge() {
        let h = harness();
        let request = Request::builder()
            .uri("/webhook?hub.mode=subscribe&hub.challenge=123&hub.verify_token=verify-me")
            .body(Body::empty())
            .unwrap();

        let response = h.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "123");
    }

    #[tokio::test]
    async fn test_verification_wrong_token_forbidden() {
        let h = harness();
        let request = Request::builder()
            .uri("/webhook?hub.mode=subscribe&hub.challenge=123&hub.verify_token=nope")
            .body(Body::empty())
            .unwrap();

        let response = h.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_string(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_verification_wrong_mode_forbidden() {
        let h = harness();
        let request = Request::builder()
            .uri("/webhook?hub.mode=unsubscribe&hub.challenge=123&hub.verify_token=verify-me")
            .body(Body::empty())
            .unwrap();

        let response = h.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_signature_forbidden_without_side_effects() {
        let h = harness();

        let response = h.router.oneshot(delivery(ONE_AUDIO, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(h.api.fetches.load(Ordering::SeqCst), 0);
        assert!(h.api.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_signature_forbidden() {
        let h = harness();
        let signature = sign("wrong_secret", ONE_AUDIO.as_bytes());

        let response = h
            .router
            .oneshot(delivery(ONE_AUDIO, Some(signature)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(h.api.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_bad_request() {
        let h = harness();
        let body = "{not json";
        let signature = sign(SECRET, body.as_bytes());

        let response = h.router.oneshot(delivery(body, Some(signature))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(h.api.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_signed_delivery_replies_with_summary() {
        let h = harness();
        let signature = sign(SECRET, ONE_AUDIO.as_bytes());

        let response = h
            .router
            .oneshot(delivery(ONE_AUDIO, Some(signature)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *h.api.sent.lock().unwrap(),
            vec![(
                "15551234567".to_string(),
                "**Summary**: hello world".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_mixed_failures_acknowledged_with_one_message_per_event() {
        let h = harness_with(
            FakeApi {
                missing: set(&["m2"]),
                ..Default::default()
            },
            FakeTranscriber {
                fail: set(&["m3"]),
                empty: set(&["m4"]),
                ..Default::default()
            },
        );
        let body = audio_delivery(&["m1", "m2", "m3", "m4", "m5"]);
        let signature = sign(SECRET, body.as_bytes());

        let response = h.router.oneshot(delivery(&body, Some(signature))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let sent = h.api.sent.lock().unwrap();
        assert_eq!(sent.len(), 5);
        let bodies: Vec<&str> = sent.iter().map(|(_, body)| body.as_str()).collect();
        assert_eq!(
            bodies,
            vec![
                "**Summary**: hello world",
                DOWNLOAD_FAILED_NOTICE,
                PROCESS_FAILED_NOTICE,
                PROCESS_FAILED_NOTICE,
                "**Summary**: transcript of m5",
            ]
        );
        // every sender is answered exactly once
        let recipients: HashSet<&str> = sent.iter().map(|(to, _)| to.as_str()).collect();
        assert_eq!(recipients.len(), 5);
        assert_eq!(h.summarizer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_transcript_delivery_sends_notice_without_summarizing() {
        let h = harness_with(
            FakeApi::default(),
            FakeTranscriber {
                empty: set(&["m1"]),
                ..Default::default()
            },
        );
        let signature = sign(SECRET, ONE_AUDIO.as_bytes());

        let response = h
            .router
            .oneshot(delivery(ONE_AUDIO, Some(signature)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *h.api.sent.lock().unwrap(),
            vec![("15551234567".to_string(), PROCESS_FAILED_NOTICE.to_string())]
        );
        assert_eq!(h.summarizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_status_callback_acknowledged() {
        let h = harness();
        let body = r#"{"object":"whatsapp_business_account","entry":[{"id":"1","changes":[{"field":"messages","value":{"statuses":[{"id":"wamid.1","status":"delivered"}]}}]}]}"#;
        let signature = sign(SECRET, body.as_bytes());

        let response = h.router.oneshot(delivery(body, Some(signature))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.api.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = h.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_other_methods_not_allowed() {
        let h = harness();
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/webhook")
            .body(Body::empty())
            .unwrap();

        let response = h.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
