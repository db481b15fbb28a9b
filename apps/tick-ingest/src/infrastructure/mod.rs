//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Exchange ticker feed and synthetic generator.
pub mod feed;

/// Tick storage backends.
pub mod storage;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing.
pub mod telemetry;
