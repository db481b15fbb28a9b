//! Application Services
//!
//! - `Orchestrator`: moves ticks from a source into a sink

mod orchestrator;

pub use orchestrator::{Orchestrator, OrchestratorError, RunSummary};
