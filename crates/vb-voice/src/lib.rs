//! vb-voice: transcription and summarization stages for voicebrief
//!
//! ## Stages
//!
//! - **Transcription**: Gemini with the audio inlined, or a
//!   Whisper-compatible `/audio/transcriptions` endpoint
//! - **Summarization**: Gemini with a fixed meeting-summary prompt
//!
//! Both implement the stage traits from `vb-core` and fail explicitly
//! when the model returns no usable text.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vb_core::{Config, GeminiClient, TranscriptionJob};
//!
//! let config = Config::load(None)?;
//! let gemini = GeminiClient::new(&config.model, &config.timeouts)?;
//! let transcriber = vb_voice::build_transcriber(&config, gemini.clone())?;
//!
//! let transcript = transcriber
//!     .transcribe(TranscriptionJob {
//!         message_id: "wamid.1".into(),
//!         audio: std::fs::read("note.ogg")?,
//!         mime_type: "audio/ogg".into(),
//!     })
//!     .await?;
//! ```

pub mod prompts;
pub mod summarization;
pub mod transcription;
pub mod whisper;

use std::sync::Arc;

use vb_core::{Config, GeminiClient, Result, Transcriber, TranscriptionProvider};

pub use summarization::GeminiSummarizer;
pub use transcription::GeminiTranscriber;
pub use whisper::{WhisperConfig, WhisperTranscriber};

/// Build the transcription stage selected by configuration
pub fn build_transcriber(config: &Config, gemini: GeminiClient) -> Result<Arc<dyn Transcriber>> {
    match config.transcription.provider {
        TranscriptionProvider::Gemini => Ok(Arc::new(GeminiTranscriber::new(gemini))),
        TranscriptionProvider::Whisper => {
            let whisper_config = WhisperConfig::from_config(config)?;
            Ok(Arc::new(WhisperTranscriber::new(whisper_config, &config.timeouts)?))
        }
    }
}
