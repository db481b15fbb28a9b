#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::missing_panics_doc
    )
)]

//! Tick Ingest - Resilient Market Data Ingestion
//!
//! Keeps one WebSocket connection to an exchange ticker stream alive
//! indefinitely, decodes each update into an exact decimal [`Tick`], and
//! appends the ticks to a durable store.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Tick type and decimal policy
//!   - `numeric`: Precision-preserving parsing and storage formatting
//!   - `tick`: Validated, immutable tick
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Tick source and tick sink interfaces
//!   - `services`: The ingestion orchestrator
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feed`: Ticker codec, connection supervisor, mock generator
//!   - `storage`: Turso and in-memory sinks
//!   - `config`: Environment-driven configuration
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! Exchange WS ──► ConnectionSupervisor ──► tick queue ──► Orchestrator ──► TursoSink
//!                   (decode, backoff)      error queue ─┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Tick types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::{NumericError, Tick, TickError, TickParts, format_full, parse_decimal};

// Ports
pub use application::ports::{
    ConnectionState, SinkError, StreamError, TickSinkPort, TickStream, TickStreamPort,
};

// Services
pub use application::services::{Orchestrator, OrchestratorError, RunSummary};

// Feed adapters
pub use infrastructure::feed::{
    ConnectionSupervisor, DecodeError, MockStreamer, SupervisorConfig, TickerCodec,
    WebSocketDialer,
};

// Storage adapters
pub use infrastructure::storage::{MemorySink, TursoSink};

// Configuration
pub use infrastructure::config::{ConfigError, IngestConfig};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
