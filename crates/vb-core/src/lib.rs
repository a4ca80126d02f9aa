//! vb-core: voicebrief core library
//!
//! Configuration, the model-service HTTP client, the stage contracts
//! shared by the transcription and summarization stages, and the
//! temporary media storage owned by one pipeline job.

pub mod config;
pub mod error;
pub mod llm;
pub mod media;
pub mod stage;

pub use config::{
    Config, MediaConfig, ModelConfig, ServerConfig, TimeoutConfig, TranscriptionConfig,
    TranscriptionProvider, WhatsAppConfig,
};
pub use error::{Error, Result};
pub use llm::{Blob, Content, GeminiClient, GenerateContentRequest, GenerateContentResponse, Part};
pub use media::MediaHandle;
pub use stage::{SummarizationJob, Summarizer, Summary, Transcriber, Transcript, TranscriptionJob};
