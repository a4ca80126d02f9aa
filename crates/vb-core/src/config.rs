//! Configuration management
//!
//! Settings are resolved in this order of precedence:
//! 1. Environment variables
//! 2. `voicebrief.toml` (or the file passed with `--config`)
//! 3. Defaults
//!
//! `${VAR_NAME}` inside the config file is expanded from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "voicebrief.toml";

/// Backend used by the transcription stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProvider {
    /// Gemini `generateContent` with the audio inlined
    #[default]
    Gemini,
    /// Whisper-compatible `/audio/transcriptions` endpoint
    Whisper,
}

impl TranscriptionProvider {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "whisper" | "openai" | "groq" => Some(Self::Whisper),
            _ => None,
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// WhatsApp Cloud API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Token echoed during the webhook subscription handshake
    pub verify_token: String,
    /// App secret keying the `X-Hub-Signature-256` HMAC
    pub app_secret: String,
    /// Bearer token for the Graph API
    pub api_token: String,
    /// Sender phone number id used for outbound replies
    pub phone_number_id: String,
    pub graph_base_url: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            verify_token: String::new(),
            app_secret: String::new(),
            api_token: String::new(),
            phone_number_id: String::new(),
            graph_base_url: default_graph_base_url(),
        }
    }
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

/// Model service (Gemini) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_model_base_url(),
        }
    }
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_model_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

/// Transcription stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub provider: TranscriptionProvider,
    pub whisper_api_key: Option<String>,
    pub whisper_model: String,
    pub whisper_base_url: String,
    /// ISO 639-1 language hint
    pub language: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: TranscriptionProvider::default(),
            whisper_api_key: None,
            whisper_model: "whisper-1".to_string(),
            whisper_base_url: "https://api.openai.com/v1".to_string(),
            language: None,
        }
    }
}

/// Deadlines for downstream calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Establishing a connection to any downstream service
    pub connect_secs: u64,
    /// Graph API calls (media lookup, download, reply)
    pub request_secs: u64,
    /// Full transcribe + summarize round trip for one event
    pub pipeline_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            pipeline_secs: 60,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn pipeline(&self) -> Duration {
        Duration::from_secs(self.pipeline_secs)
    }
}

/// Temporary audio storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub temp_dir: PathBuf,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
        }
    }
}

/// Main configuration for voicebrief
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub whatsapp: WhatsAppConfig,
    pub model: ModelConfig,
    pub transcription: TranscriptionConfig,
    pub timeouts: TimeoutConfig,
    pub media: MediaConfig,
}

impl Config {
    /// Expand `${VAR_NAME}` occurrences from the environment.
    ///
    /// Unset variables expand to the empty string.
    fn expand_env_vars(value: &str) -> String {
        Self::expand_vars_with(value, |name| std::env::var(name).ok())
    }

    fn expand_vars_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
        let mut result = String::with_capacity(value.len());
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Some(env_value) = lookup(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        let mut config = Self::from_toml_str(&Self::expand_env_vars(&toml_content))?;
        config.apply_env_overrides();

        Ok(config)
    }

    fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load from `path` if given, else `voicebrief.toml` if present, else environment only
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_toml_file(path);
        }

        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        Ok(Self::from_env())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Override fields from a variable source. Empty values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        // WhatsApp
        if let Some(v) = var("WHATSAPP_VERIFY_TOKEN") {
            self.whatsapp.verify_token = v;
        }
        if let Some(v) = var("WHATSAPP_APP_SECRET") {
            self.whatsapp.app_secret = v;
        }
        if let Some(v) = var("WHATSAPP_API_TOKEN") {
            self.whatsapp.api_token = v;
        }
        if let Some(v) = var("WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = v;
        }
        if let Some(v) = var("WHATSAPP_GRAPH_BASE_URL") {
            self.whatsapp.graph_base_url = v;
        }

        // Model service
        if let Some(v) = var("GEMINI_API_KEY") {
            self.model.api_key = v;
        }
        if let Some(v) = var("GEMINI_MODEL") {
            self.model.model = v;
        }
        if let Some(v) = var("GEMINI_BASE_URL") {
            self.model.base_url = v;
        }

        // Transcription
        if let Some(provider) = var("TRANSCRIPTION_PROVIDER").and_then(|p| TranscriptionProvider::parse(&p)) {
            self.transcription.provider = provider;
        }
        if let Some(v) = var("WHISPER_API_KEY") {
            self.transcription.whisper_api_key = Some(v);
        }
        if let Some(v) = var("WHISPER_MODEL") {
            self.transcription.whisper_model = v;
        }
        if let Some(v) = var("WHISPER_BASE_URL") {
            self.transcription.whisper_base_url = v;
        }
        if let Some(v) = var("TRANSCRIPTION_LANGUAGE") {
            self.transcription.language = Some(v);
        }

        // Timeouts
        if let Some(secs) = var("CONNECT_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.timeouts.connect_secs = secs;
        }
        if let Some(secs) = var("REQUEST_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.timeouts.request_secs = secs;
        }
        if let Some(secs) = var("PIPELINE_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.timeouts.pipeline_secs = secs;
        }

        if let Some(dir) = var("MEDIA_TEMP_DIR") {
            self.media.temp_dir = PathBuf::from(dir);
        }
    }

    /// Check that every required setting is present
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("WHATSAPP_VERIFY_TOKEN", &self.whatsapp.verify_token),
            ("WHATSAPP_APP_SECRET", &self.whatsapp.app_secret),
            ("WHATSAPP_API_TOKEN", &self.whatsapp.api_token),
            ("WHATSAPP_PHONE_NUMBER_ID", &self.whatsapp.phone_number_id),
            ("GEMINI_API_KEY", &self.model.api_key),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} not set", name)));
            }
        }

        if self.transcription.provider == TranscriptionProvider::Whisper
            && self
                .transcription
                .whisper_api_key
                .as_deref()
                .is_none_or(|k| k.trim().is_empty())
        {
            return Err(Error::Config(
                "WHISPER_API_KEY not set (required for the whisper provider)".to_string(),
            ));
        }

        if self.timeouts.connect_secs == 0 || self.timeouts.request_secs == 0 || self.timeouts.pipeline_secs == 0 {
            return Err(Error::Config("timeouts must be greater than zero".to_string()));
        }

        Ok(())
    }
}
