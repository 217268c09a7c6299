use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber;

use wayfarer::advisor::GeminiAdvisor;
use wayfarer::config::WayfarerConfig;
use wayfarer::history::HistoryStore;
use wayfarer::http::{AppState, HttpServer};
use wayfarer::ratelimit::SlidingWindowLimiter;

/// AI-assisted travel requirements API with per-client rate limiting.
#[derive(Parser, Debug)]
#[command(name = "wayfarer", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address, overriding the configuration file
    #[arg(short, long)]
    listen: Option<std::net::SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let cli = Cli::parse();

    info!("Starting Wayfarer Travel API");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => WayfarerConfig::from_file(path)?,
        None => WayfarerConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.server.http_addr = listen;
    }
    config.validate()?;
    info!(http_addr = %config.server.http_addr, "Configuration loaded");

    // Initialize the advisor and the history store
    let advisor = GeminiAdvisor::new(config.gemini.clone())?;
    info!(model = %config.gemini.model, "Gemini advisor initialized");

    let store = HistoryStore::open(&config.database.path)?;

    // One limiter per route group, constructed here so the policies are
    // visible in one place
    let query_limiter = Arc::new(SlidingWindowLimiter::new(config.rate_limiting.query)?);
    let history_limiter = Arc::new(SlidingWindowLimiter::new(config.rate_limiting.history)?);
    info!(
        query_limit = query_limiter.policy().max_requests,
        query_window_secs = query_limiter.policy().window_secs,
        history_limit = history_limiter.policy().max_requests,
        history_window_secs = history_limiter.policy().window_secs,
        "Rate limiters initialized"
    );

    let state = AppState::new(Arc::new(advisor), Arc::new(store));
    let server = HttpServer::new(&config.server, state, query_limiter, history_limiter)?;

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Wayfarer Travel API stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
