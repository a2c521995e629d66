//! Tick Stream Binary
//!
//! Starts the session tick fan-out server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tick-stream
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `TICK_STREAM_SYMBOL`: Symbol to stream (default: NVDA)
//! - `TICK_STREAM_INTERVAL`: Bar interval (default: 1m)
//! - `TICK_STREAM_BACKFILL_DAYS`: Trailing trading days to backfill (default: 5)
//! - `TICK_STREAM_POLL_INTERVAL_SECS`: Live poll cadence (default: 30)
//! - `TICK_STREAM_TRAILING_WINDOW_SECS`: Live query span (default: 300)
//! - `TICK_STREAM_HTTP_PORT`: HTTP/WebSocket port (default: 8080)
//! - `TICK_STREAM_SOURCE_BASE_URL`: Quote source base URL
//! - `TICK_STREAM_SOURCE_TIMEOUT_SECS`: Quote source request timeout (default: 10)
//! - `TICK_STREAM_BROADCAST_CAPACITY`: Per-subscriber channel capacity (default: 1024)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: tick-stream)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use tick_stream::application::ports::SystemClock;
use tick_stream::infrastructure::broadcast::TickHub;
use tick_stream::infrastructure::http::{ApiServer, ApiState};
use tick_stream::infrastructure::telemetry;
use tick_stream::infrastructure::yahoo::YahooQuoteSource;
use tick_stream::{SessionDriver, StreamConfig, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting tick stream server");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = StreamConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Ledger + fan-out hub, the one piece of shared mutable state
    let hub = Arc::new(TickHub::new(config.broadcast.capacity));

    // API server (WebSocket + snapshot + health + metrics)
    let api_state = Arc::new(ApiState::new(
        config.stream.symbol.clone(),
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&hub),
    ));
    let api_server = ApiServer::new(
        config.server.http_port,
        api_state,
        shutdown_token.clone(),
    );

    tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            tracing::error!(error = %e, "API server error");
        }
    });

    // Session driver: backfill, then live polling until the session closes
    let source = Arc::new(YahooQuoteSource::new(&config.source)?);
    let driver = SessionDriver::new(
        source,
        Arc::new(SystemClock),
        Arc::clone(&hub),
        config.backfill_settings(),
        config.poller_settings(),
        shutdown_token.clone(),
    );

    tokio::spawn(async move {
        driver.run().await;
    });

    tracing::info!("Tick stream ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Tick stream stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &StreamConfig) {
    tracing::info!(
        symbol = %config.stream.symbol,
        interval = %config.stream.interval,
        backfill_days = config.stream.backfill_days,
        poll_interval_secs = config.stream.poll_interval.as_secs(),
        trailing_window_secs = config.stream.trailing_window.as_secs(),
        http_port = config.server.http_port,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
