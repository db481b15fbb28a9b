//! Tick Storage Adapters
//!
//! Implements the tick sink port:
//!
//! - **Turso**: durable embedded database
//! - **Memory**: in-process map for tests and dry runs

pub mod memory;
pub mod row;
pub mod turso;

pub use memory::MemorySink;
pub use row::StoredTick;
pub use turso::{DEFAULT_SINK_TIMEOUT, TursoSink};
