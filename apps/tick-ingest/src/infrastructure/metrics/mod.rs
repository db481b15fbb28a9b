//! Prometheus Metrics Module
//!
//! Exposes ingestion metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Feed**: ticks received, decode failures, stream errors, reconnects
//! - **Connection**: current supervisor state
//! - **Persistence**: ticks persisted, persist failures, insert latency
//!
//! Recording functions are no-ops until [`init_metrics`] installs a
//! recorder, so library code and tests can call them freely.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::ports::ConnectionState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics setup errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Recorder or HTTP listener could not be installed.
    #[error("failed to install Prometheus exporter: {0}")]
    Install(#[from] BuildError),
}

/// Install the Prometheus recorder.
///
/// With a non-zero `port` an HTTP listener serving `/metrics` is spawned on
/// `0.0.0.0:port` (requires a tokio runtime). With `port == 0` only the
/// in-process recorder is installed and [`get_metrics_handle`] can render it.
/// Calling this more than once is a no-op.
///
/// # Errors
///
/// Returns an error if a recorder is already installed by someone else or
/// the listener cannot be started.
pub fn init_metrics(port: u16) -> Result<(), MetricsError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    if port == 0 {
        let handle = PrometheusBuilder::new().install_recorder()?;
        let _ = PROMETHEUS_HANDLE.set(handle);
    } else {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    register_metrics();
    Ok(())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` unless metrics were initialized in recorder-only mode.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Feed counters
    describe_counter!(
        "tick_ingest_ticks_received_total",
        "Total ticks decoded from the feed"
    );
    describe_counter!(
        "tick_ingest_decode_failures_total",
        "Total feed messages that failed to decode"
    );
    describe_counter!(
        "tick_ingest_stream_errors_total",
        "Total stream errors by kind"
    );
    describe_counter!(
        "tick_ingest_reconnects_total",
        "Total feed reconnection attempts"
    );

    describe_gauge!(
        "tick_ingest_connection_state",
        "Current feed connection state (0 disconnected .. 5 closed)"
    );

    // Persistence
    describe_counter!(
        "tick_ingest_ticks_persisted_total",
        "Total ticks written to the sink"
    );
    describe_counter!(
        "tick_ingest_persist_failures_total",
        "Total sink insert failures by kind"
    );
    describe_histogram!(
        "tick_ingest_persist_seconds",
        "Time spent in a single sink insert"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

const fn state_code(state: ConnectionState) -> f64 {
    match state {
        ConnectionState::Disconnected => 0.0,
        ConnectionState::Connecting => 1.0,
        ConnectionState::Connected => 2.0,
        ConnectionState::Reconnecting => 3.0,
        ConnectionState::Closing => 4.0,
        ConnectionState::Closed => 5.0,
    }
}

/// Record a tick decoded from the feed.
pub fn record_tick_received(symbol: &str) {
    counter!(
        "tick_ingest_ticks_received_total",
        "symbol" => symbol.to_string()
    )
    .increment(1);
}

/// Record a feed message that failed to decode.
pub fn record_decode_failure() {
    counter!("tick_ingest_decode_failures_total").increment(1);
}

/// Record a stream error.
pub fn record_stream_error(kind: &'static str) {
    counter!("tick_ingest_stream_errors_total", "kind" => kind).increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("tick_ingest_reconnects_total").increment(1);
}

/// Publish the current connection state.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("tick_ingest_connection_state").set(state_code(state));
}

/// Record a tick written to the sink.
pub fn record_tick_persisted(duration: Duration) {
    counter!("tick_ingest_ticks_persisted_total").increment(1);
    histogram!("tick_ingest_persist_seconds").record(duration.as_secs_f64());
}

/// Record a failed sink insert.
pub fn record_persist_failure(kind: &'static str) {
    counter!("tick_ingest_persist_failures_total", "kind" => kind).increment(1);
}
