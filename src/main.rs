//! Typing Coach binary entry point.
//!
//! Serves newline-delimited JSON requests over stdio. All logs go to
//! stderr; stdout carries only response lines.
//!
//! Coverage is excluded because the main function needs a real process
//! with stdio attached.

// Enable the coverage attribute when running with nightly for llvm-cov exclusions
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use typing_coach::config::Config;
use typing_coach::server::CoachServer;

#[cfg_attr(coverage_nightly, coverage(off))]
fn init_tracing() {
    let filter = std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .parse()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() {
    init_tracing();

    tracing::info!("typing-coach starting...");

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        model = %config.model,
        timeout_ms = config.request_timeout_ms,
        failure_threshold = config.failure_threshold,
        snapshot = config.snapshot_path.as_deref().unwrap_or("none"),
        "Configuration loaded"
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "Could not listen for interrupts"),
        }
    });

    let server = CoachServer::new(config);
    if let Err(e) = server.run_stdio(&cancel).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }

    tracing::info!("typing-coach shutdown complete");
}
