//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the ingestion service and the port interfaces that
//! define how it talks to the feed and to storage.

/// Port interfaces for tick sources and sinks.
pub mod ports;

/// Application services (the ingestion orchestrator).
pub mod services;
