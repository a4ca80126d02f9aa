//! voicebrief: WhatsApp voice note summarizer
//!
//! Main entry point. Wires the WhatsApp webhook gateway to the
//! transcription and summarization pipeline.
//!
//! Usage:
//!   voicebrief                   - Start the webhook server
//!   voicebrief --config <path>   - Start with an explicit config file
//!   voicebrief --help            - Show help

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use vb_core::{Config, GeminiClient, Summarizer, Transcriber};
use vb_pipeline::Orchestrator;
use vb_voice::GeminiSummarizer;
use vb_whatsapp::{GraphApiClient, MessageHandler, WebhookState};

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Webhook server
    Server { config_path: Option<PathBuf> },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_args(std::env::args().skip(1))?;

    let config_path = match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("voicebrief {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server { config_path } => config_path,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load(config_path.as_deref())
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting voicebrief...");
    tracing::info!(
        "Model: {}, transcription: {:?}",
        config.model.model,
        config.transcription.provider
    );

    run_server(config).await
}

/// Parse command line arguments
fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<RunMode> {
    let mut config_path = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
                config_path = Some(PathBuf::from(path));
            }
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(RunMode::Server { config_path })
}

/// Print help message
fn print_help() {
    println!("voicebrief - WhatsApp voice note summarizer");
    println!();
    println!("Usage:");
    println!("  voicebrief                  Start the webhook server");
    println!("  voicebrief --config <path>  Load settings from a TOML file (default: voicebrief.toml)");
    println!("  voicebrief --help           Show this help message");
    println!("  voicebrief --version        Show version");
    println!();
    println!("Environment Variables:");
    println!("  PORT                        Webhook listen port (default: 8080)");
    println!("  WHATSAPP_VERIFY_TOKEN       Subscription handshake token (required)");
    println!("  WHATSAPP_APP_SECRET         Delivery signature secret (required)");
    println!("  WHATSAPP_API_TOKEN          Graph API bearer token (required)");
    println!("  WHATSAPP_PHONE_NUMBER_ID    Sending phone number id (required)");
    println!("  WHATSAPP_GRAPH_BASE_URL     Graph API base (default: https://graph.facebook.com/v19.0)");
    println!("  GEMINI_API_KEY              Gemini API key (required)");
    println!("  GEMINI_MODEL                Model name (default: gemini-1.5-flash)");
    println!("  GEMINI_BASE_URL             Custom Gemini endpoint");
    println!("  TRANSCRIPTION_PROVIDER      gemini or whisper (default: gemini)");
    println!("  WHISPER_API_KEY             Whisper API key (required for whisper)");
    println!("  WHISPER_MODEL               Whisper model (default: whisper-1)");
    println!("  WHISPER_BASE_URL            Whisper endpoint (default: https://api.openai.com/v1)");
    println!("  TRANSCRIPTION_LANGUAGE      Language hint for whisper");
    println!("  CONNECT_TIMEOUT_SECS        Outbound connect timeout (default: 5)");
    println!("  REQUEST_TIMEOUT_SECS        Graph API request timeout (default: 30)");
    println!("  PIPELINE_TIMEOUT_SECS       Per-message pipeline deadline (default: 60)");
    println!("  MEDIA_TEMP_DIR              Directory for downloaded audio");
    println!("  RUST_LOG                    Log filter (default: info)");
}

/// Build every component once and serve until shutdown
async fn run_server(config: Config) -> anyhow::Result<()> {
    let gemini = GeminiClient::new(&config.model, &config.timeouts)
        .map_err(|e| anyhow::anyhow!("Failed to create model client: {}", e))?;

    let transcriber = vb_voice::build_transcriber(&config, gemini.clone())
        .map_err(|e| anyhow::anyhow!("Failed to create transcriber: {}", e))?;
    let summarizer = Arc::new(GeminiSummarizer::new(gemini));

    tracing::info!(
        "Stages: transcription={}, summarization={}",
        transcriber.name(),
        summarizer.name()
    );

    let orchestrator = Orchestrator::new(transcriber, summarizer);

    let graph_api = GraphApiClient::new(&config.whatsapp, &config.timeouts)
        .map_err(|e| anyhow::anyhow!("Failed to create Graph API client: {}", e))?;

    let handler = MessageHandler::new(
        Arc::new(graph_api),
        orchestrator,
        config.media.temp_dir.clone(),
        config.timeouts.pipeline(),
    );

    let state = WebhookState {
        verify_token: config.whatsapp.verify_token.clone(),
        app_secret: config.whatsapp.app_secret.clone(),
        handler: Arc::new(handler),
    };

    tracing::info!("voicebrief initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    vb_whatsapp::start_webhook_server(state, config.server.port, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down...");
}
