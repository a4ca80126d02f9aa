//! Model service API
//!
//! Thin client for the Gemini `generateContent` endpoint used by both
//! pipeline stages.

mod client;
mod types;

pub use client::GeminiClient;
pub use types::*;
