//! Tick Ingest Binary
//!
//! Streams one symbol's ticker into the tick store until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tick-ingest
//! USE_MOCK_STREAMER=true cargo run --bin tick-ingest
//! ```
//!
//! # Environment Variables
//!
//! - `TICK_INGEST_SYMBOL`: Instrument (default: btcusdt)
//! - `TICK_INGEST_FEED_HOST`: Feed host (default: stream.binance.com:9443)
//! - `USE_MOCK_STREAMER`: Use the synthetic generator (default: false)
//! - `TICK_INGEST_MOCK_INTERVAL_MS`: Generator interval (default: 500)
//! - `TICK_INGEST_MOCK_BASE_PRICE`: Generator start price (default: 100.0)
//! - `TICK_INGEST_DB_PATH`: Tick store path (default: ticks.db)
//! - `TICK_INGEST_DRY_RUN`: Keep ticks in memory, no database (default: false)
//! - `TICK_INGEST_HANDSHAKE_TIMEOUT_SECS`: Dial bound (default: 10)
//! - `TICK_INGEST_READ_TIMEOUT_SECS`: Read deadline (default: 5)
//! - `TICK_INGEST_RECONNECT_DELAY_MIN_MS`: Initial backoff (default: 500)
//! - `TICK_INGEST_RECONNECT_DELAY_MAX_SECS`: Backoff cap (default: 30)
//! - `TICK_INGEST_MAX_RECONNECT_ATTEMPTS`: 0 = unlimited (default: 0)
//! - `TICK_INGEST_TICK_QUEUE_CAPACITY`: Tick queue size (default: 32)
//! - `TICK_INGEST_SINK_TIMEOUT_SECS`: Store operation bound (default: 3)
//! - `TICK_INGEST_METRICS_PORT`: Prometheus port, 0 = off (default: 9090)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: tick_ingest=info)

use std::sync::Arc;

use tick_ingest::infrastructure::telemetry;
use tick_ingest::{
    ConnectionSupervisor, IngestConfig, MemorySink, Orchestrator, TickSinkPort, TickStreamPort,
    TursoSink, WebSocketDialer, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting tick ingest");

    let config = IngestConfig::from_env()?;
    init_metrics(config.metrics_port)?;
    log_config(&config);

    let sink: Arc<dyn TickSinkPort> = if config.storage.dry_run {
        tracing::info!("Dry run, ticks are kept in memory only");
        Arc::new(MemorySink::new())
    } else {
        Arc::new(TursoSink::open(&config.storage.db_path, config.storage.op_timeout).await?)
    };

    let streamer: Arc<dyn TickStreamPort> = if config.mock.enabled {
        tracing::info!("Using mock streamer");
        Arc::new(config.mock_streamer())
    } else {
        Arc::new(ConnectionSupervisor::new(
            WebSocketDialer::new(),
            config.supervisor_config(),
        ))
    };

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let orchestrator = Orchestrator::new(streamer, Arc::clone(&sink));
    let result = orchestrator.run(shutdown_token.clone(), &config.symbol).await;

    // Stops the signal watcher when the stream ended on its own
    shutdown_token.cancel();

    if let Err(e) = sink.close().await {
        tracing::warn!(error = %e, "Failed to close tick store");
    }

    let summary = result?;
    tracing::info!(
        received = summary.received,
        persisted = summary.persisted,
        duplicates = summary.duplicates,
        failed = summary.failed,
        "Tick ingest stopped"
    );

    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &IngestConfig) {
    tracing::info!(
        symbol = %config.symbol,
        mock = config.mock.enabled,
        db_path = %config.storage.db_path,
        dry_run = config.storage.dry_run,
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        endpoint = %config.supervisor_config().endpoint(&config.symbol),
        handshake_timeout_secs = config.feed.handshake_timeout.as_secs(),
        read_timeout_secs = config.feed.read_timeout.as_secs(),
        "Feed settings"
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

/// Wait for SIGTERM or SIGINT, then cancel `shutdown_token`.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
        () = shutdown_token.cancelled() => return,
    }

    shutdown_token.cancel();
}
