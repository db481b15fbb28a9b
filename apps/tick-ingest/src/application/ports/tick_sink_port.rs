//! Tick Sink Port (Driven Port)
//!
//! Interface for durable tick storage. Records are keyed by
//! `(symbol, event_time)`; a second insert with the same key is reported as
//! [`SinkError::Duplicate`] and leaves the stored row untouched.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Tick;

/// Sink error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// A row with the same natural key already exists.
    #[error("tick already stored for {symbol} at {event_time}")]
    Duplicate {
        /// Instrument symbol.
        symbol: String,
        /// Event time, epoch milliseconds.
        event_time: i64,
    },

    /// Operation did not complete in time.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// Configured bound.
        timeout: Duration,
    },

    /// Sink was closed.
    #[error("sink is closed")]
    Closed,

    /// Stored row could not be turned back into a tick.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Storage engine failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl SinkError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Duplicate { .. } => "duplicate",
            Self::Timeout { .. } => "timeout",
            Self::Closed => "closed",
            Self::Corrupt(_) => "corrupt",
            Self::Storage(_) => "storage",
        }
    }
}

/// Port for tick persistence.
#[async_trait]
pub trait TickSinkPort: Send + Sync {
    /// Append a tick.
    async fn insert(&self, tick: &Tick) -> Result<(), SinkError>;

    /// Find the tick stored for `event_time`, if any.
    ///
    /// When several symbols share the timestamp the first by symbol wins.
    async fn lookup(&self, event_time: i64) -> Result<Option<Tick>, SinkError>;

    /// Release all resources. Later calls fail with [`SinkError::Closed`].
    async fn close(&self) -> Result<(), SinkError>;
}
