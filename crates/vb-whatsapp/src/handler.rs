//! Per-delivery processing
//!
//! Events in one delivery run one at a time. Each event ends in exactly one
//! outbound message (the summary or a failure notice) unless the send
//! itself fails, which is logged and dropped. One event's failure never
//! stops its siblings.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;
use vb_core::MediaHandle;
use vb_pipeline::{Orchestrator, ProcessRequest};

use crate::api::MessagingApi;
use crate::error::{Result, WhatsAppError};
use crate::types::InboundEvent;

/// Sent when the audio could not be retrieved
pub const DOWNLOAD_FAILED_NOTICE: &str = "Sorry, failed to download your audio.";

/// Sent when transcription or summarization failed or timed out
pub const PROCESS_FAILED_NOTICE: &str = "Sorry, failed to process your audio.";

/// What happened to one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Summary delivered
    Replied,
    /// Failure notice delivered; carries the failure
    FailureNotified(String),
    /// The outbound send failed; nothing reached the sender
    ReplyFailed(String),
}

/// Outcomes for every event of one delivery, in order
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub delivery_id: Uuid,
    pub outcomes: Vec<(String, EventOutcome)>,
}

impl DeliveryReport {
    pub fn replied(&self) -> usize {
        self.count(|o| matches!(o, EventOutcome::Replied))
    }

    pub fn notified(&self) -> usize {
        self.count(|o| matches!(o, EventOutcome::FailureNotified(_)))
    }

    pub fn reply_failed(&self) -> usize {
        self.count(|o| matches!(o, EventOutcome::ReplyFailed(_)))
    }

    fn count(&self, pred: impl Fn(&EventOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Drives fetch -> orchestrate -> reply for each audio event
pub struct MessageHandler {
    api: Arc<dyn MessagingApi>,
    orchestrator: Orchestrator,
    media_dir: PathBuf,
    pipeline_timeout: Duration,
}

impl MessageHandler {
    pub fn new(
        api: Arc<dyn MessagingApi>,
        orchestrator: Orchestrator,
        media_dir: PathBuf,
        pipeline_timeout: Duration,
    ) -> Self {
        Self {
            api,
            orchestrator,
            media_dir,
            pipeline_timeout,
        }
    }

    /// Process every actionable event of a delivery sequentially
    pub async fn handle_delivery(&self, events: Vec<InboundEvent>) -> DeliveryReport {
        let delivery_id = Uuid::new_v4();
        let mut outcomes = Vec::with_capacity(events.len());

        for event in events {
            if !event.is_actionable() {
                continue;
            }
            let outcome = self.process_event(delivery_id, &event).await;
            outcomes.push((event.message_id, outcome));
        }

        let report = DeliveryReport {
            delivery_id,
            outcomes,
        };

        info!(
            %delivery_id,
            replied = report.replied(),
            notified = report.notified(),
            reply_failed = report.reply_failed(),
            "delivery processed"
        );

        report
    }

    async fn process_event(&self, delivery_id: Uuid, event: &InboundEvent) -> EventOutcome {
        info!(
            %delivery_id,
            sender = %event.sender_id,
            media_id = ?event.media_id,
            "Received audio message"
        );

        let (text, failure) = match self.summarize_event(event).await {
            Ok(summary) => (summary, None),
            Err(e) => {
                warn!(%delivery_id, message_id = %event.message_id, "event failed: {}", e);
                let notice = match e {
                    WhatsAppError::MediaFetch(_) => DOWNLOAD_FAILED_NOTICE,
                    _ => PROCESS_FAILED_NOTICE,
                };
                (notice.to_string(), Some(e.to_string()))
            }
        };

        match self.api.send_text(&event.sender_id, &text).await {
            Ok(()) => match failure {
                None => EventOutcome::Replied,
                Some(reason) => EventOutcome::FailureNotified(reason),
            },
            Err(e) => {
                error!(%delivery_id, sender = %event.sender_id, "failed to send reply: {}", e);
                EventOutcome::ReplyFailed(e.to_string())
            }
        }
    }

    async fn summarize_event(&self, event: &InboundEvent) -> Result<String> {
        let media_id = event
            .media_id
            .as_deref()
            .ok_or_else(|| WhatsAppError::InvalidPayload("audio message without media id".to_string()))?;

        let media = self.api.fetch_media(media_id).await?;

        let handle = MediaHandle::persist(&self.media_dir, media_id, &media.mime_type, &media.bytes)
            .await
            .map_err(|e| WhatsAppError::Storage(e.to_string()))?;

        let request = ProcessRequest {
            sender_id: event.sender_id.clone(),
            media_id: media_id.to_string(),
            media: handle,
        };

        let summary = tokio::time::timeout(
            self.pipeline_timeout,
            self.orchestrator.process_voice_message(request),
        )
        .await
        .map_err(|_| WhatsAppError::Timeout(self.pipeline_timeout))??;

        Ok(summary.text)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::DownloadedMedia;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vb_core::{
        Error, SummarizationJob, Summarizer, Summary, Transcriber, Transcript, TranscriptionJob,
    };

    /// Records sends; media ids in `missing` fail to download
    #[derive(Default)]
    pub(crate) struct FakeApi {
        pub missing: HashSet<String>,
        pub fail_sends: bool,
        pub sent: Mutex<Vec<(String, String)>>,
        pub fetches: AtomicUsize,
    }

    #[async_trait]
    impl MessagingApi for FakeApi {
        async fn fetch_media(&self, media_id: &str) -> Result<DownloadedMedia> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.missing.contains(media_id) {
                return Err(WhatsAppError::MediaFetch("failed to get media url: 404".into()));
            }
            Ok(DownloadedMedia {
                bytes: media_id.as_bytes().to_vec(),
                mime_type: "audio/ogg".to_string(),
            })
        }

        async fn send_text(&self, to: &str, body: &str) -> Result<()> {
            self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
            if self.fail_sends {
                return Err(WhatsAppError::Api("failed to send reply: 500".into()));
            }
            Ok(())
        }
    }

    /// Transcribes audio bytes as text; fails on media ids listed in `fail`,
    /// returns nothing for `empty`, hangs for `hang`
    #[derive(Default)]
    pub(crate) struct FakeTranscriber {
        pub fail: HashSet<String>,
        pub empty: HashSet<String>,
        pub hang: HashSet<String>,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        fn name(&self) -> &str {
            "fake"
        }

        async fn transcribe(&self, job: TranscriptionJob) -> vb_core::Result<Transcript> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.contains(&job.message_id) {
                return Err(Error::ModelApi("503: unavailable".into()));
            }
            if self.hang.contains(&job.message_id) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let text = if self.empty.contains(&job.message_id) {
                String::new()
            } else if job.message_id == "m1" {
                "hello world".to_string()
            } else {
                format!("transcript of {}", String::from_utf8_lossy(&job.audio))
            };
            Transcript::new(job.message_id, text)
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeSummarizer {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl Summarizer for FakeSummarizer {
        fn name(&self) -> &str {
            "fake"
        }

        async fn summarize(&self, job: SummarizationJob) -> vb_core::Result<Summary> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Summary::new(job.message_id, format!("**Summary**: {}", job.transcript))
        }
    }

    pub(crate) fn audio_event(sender: &str, media_id: &str) -> InboundEvent {
        InboundEvent {
            sender_id: sender.to_string(),
            message_id: format!("wamid.{}", media_id),
            kind: "audio".to_string(),
            media_id: Some(media_id.to_string()),
        }
    }

    pub(crate) fn handler(
        api: Arc<FakeApi>,
        transcriber: Arc<FakeTranscriber>,
        summarizer: Arc<FakeSummarizer>,
        dir: &tempfile::TempDir,
    ) -> MessageHandler {
        MessageHandler::new(
            api,
            Orchestrator::new(transcriber, summarizer),
            dir.path().to_path_buf(),
            Duration::from_millis(200),
        )
    }

    fn dir_is_empty(dir: &tempfile::TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_single_audio_message_replies_with_summary() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeApi::default());
        let handler = handler(
            api.clone(),
            Arc::new(FakeTranscriber::default()),
            Arc::new(FakeSummarizer::default()),
            &dir,
        );

        let report = handler
            .handle_delivery(vec![audio_event("15551234567", "m1")])
            .await;

        assert_eq!(report.replied(), 1);
        assert_eq!(
            *api.sent.lock().unwrap(),
            vec![(
                "15551234567".to_string(),
                "**Summary**: hello world".to_string()
            )]
        );
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_empty_transcript_sends_failure_notice() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeApi::default());
        let transcriber = Arc::new(FakeTranscriber {
            empty: HashSet::from(["m1".to_string()]),
            ..Default::default()
        });
        let summarizer = Arc::new(FakeSummarizer::default());
        let handler = handler(api.clone(), transcriber, summarizer.clone(), &dir);

        let report = handler.handle_delivery(vec![audio_event("1555", "m1")]).await;

        assert_eq!(report.notified(), 1);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            *api.sent.lock().unwrap(),
            vec![("1555".to_string(), PROCESS_FAILED_NOTICE.to_string())]
        );
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_download_failure_notice_and_siblings_continue() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeApi {
            missing: HashSet::from(["m2".to_string()]),
            ..Default::default()
        });
        let transcriber = Arc::new(FakeTranscriber::default());
        let handler = handler(
            api.clone(),
            transcriber.clone(),
            Arc::new(FakeSummarizer::default()),
            &dir,
        );

        let report = handler
            .handle_delivery(vec![
                audio_event("a", "m1"),
                audio_event("b", "m2"),
                audio_event("c", "m3"),
            ])
            .await;

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.replied(), 2);
        assert_eq!(report.notified(), 1);

        let sent = api.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1], ("b".to_string(), DOWNLOAD_FAILED_NOTICE.to_string()));
        assert_eq!(sent[2], ("c".to_string(), "**Summary**: transcript of m3".to_string()));
        // the failed download never reached the pipeline
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_n_events_m_failures_yield_n_notices() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeApi::default());
        let transcriber = Arc::new(FakeTranscriber {
            fail: HashSet::from(["m2".to_string(), "m4".to_string()]),
            empty: HashSet::from(["m5".to_string()]),
            ..Default::default()
        });
        let handler = handler(
            api.clone(),
            transcriber,
            Arc::new(FakeSummarizer::default()),
            &dir,
        );

        let events: Vec<_> = (1..=6)
            .map(|i| audio_event(&format!("user{}", i), &format!("m{}", i)))
            .collect();
        let report = handler.handle_delivery(events).await;

        let sent = api.sent.lock().unwrap();
        assert_eq!(sent.len(), 6);
        let failures = sent
            .iter()
            .filter(|(_, body)| body == PROCESS_FAILED_NOTICE)
            .count();
        assert_eq!(failures, 3);
        assert_eq!(report.notified(), 3);
        assert_eq!(report.replied(), 3);
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_pipeline_deadline_sends_notice() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeApi::default());
        let transcriber = Arc::new(FakeTranscriber {
            hang: HashSet::from(["m1".to_string()]),
            ..Default::default()
        });
        let handler = handler(
            api.clone(),
            transcriber,
            Arc::new(FakeSummarizer::default()),
            &dir,
        );

        let report = handler
            .handle_delivery(vec![audio_event("a", "m1"), audio_event("b", "m2")])
            .await;

        assert!(matches!(
            report.outcomes[0].1,
            EventOutcome::FailureNotified(ref reason) if reason.contains("deadline")
        ));
        assert_eq!(report.outcomes[1].1, EventOutcome::Replied);
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_reply_failure_is_logged_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeApi {
            fail_sends: true,
            ..Default::default()
        });
        let handler = handler(
            api.clone(),
            Arc::new(FakeTranscriber::default()),
            Arc::new(FakeSummarizer::default()),
            &dir,
        );

        let report = handler
            .handle_delivery(vec![audio_event("a", "m1"), audio_event("b", "m2")])
            .await;

        assert_eq!(report.reply_failed(), 2);
        // one attempt per event, no follow-up failure notice
        assert_eq!(api.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_actionable_events_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeApi::default());
        let handler = handler(
            api.clone(),
            Arc::new(FakeTranscriber::default()),
            Arc::new(FakeSummarizer::default()),
            &dir,
        );

        let text = InboundEvent {
            sender_id: "a".to_string(),
            message_id: "wamid.t".to_string(),
            kind: "text".to_string(),
            media_id: None,
        };
        let report = handler.handle_delivery(vec![text]).await;

        assert!(report.outcomes.is_empty());
        assert_eq!(api.fetches.load(Ordering::SeqCst), 0);
        assert!(api.sent.lock().unwrap().is_empty());
    }
}
