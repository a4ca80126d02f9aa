//! vb-pipeline: the voice message orchestrator
//!
//! Runs transcription then summarization for one job, classifies
//! failures, and releases the job's temporary audio on every exit path.

pub mod error;
pub mod orchestrator;
pub mod state;

pub use error::{FailureKind, PipelineError, Result};
pub use orchestrator::{Orchestrator, ProcessRequest};
pub use state::PipelineState;
