//! Tick Stream Port (Driven Port)
//!
//! Interface for any source of normalized ticks: the live exchange feed or
//! the synthetic generator. A call to [`TickStreamPort::stream`] spawns one
//! background task and hands back the receiving halves of its queues.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::domain::Tick;

/// Connection lifecycle of a tick source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket held.
    #[default]
    Disconnected,
    /// Dial in progress.
    Connecting,
    /// Reading messages.
    Connected,
    /// Waiting out the backoff delay before the next dial.
    Reconnecting,
    /// Shutting down after cancellation.
    Closing,
    /// Terminal; both queues are closed.
    Closed,
}

impl ConnectionState {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    /// Whether no further events will be produced.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Errors reported on the error queue of a [`TickStream`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Dial failed before the handshake completed.
    #[error("dial error for {url}: {reason}")]
    Dial {
        /// Endpoint dialed.
        url: String,
        /// Transport failure.
        reason: String,
    },

    /// Handshake did not finish in time.
    #[error("handshake with {url} timed out after {timeout:?}")]
    HandshakeTimeout {
        /// Endpoint dialed.
        url: String,
        /// Configured handshake timeout.
        timeout: Duration,
    },

    /// Established connection failed while reading.
    #[error("read error: {reason}")]
    Read {
        /// Transport failure.
        reason: String,
    },

    /// Reconnection limit reached; the stream is ending.
    #[error("gave up after {attempts} reconnection attempts")]
    GaveUp {
        /// Attempts made.
        attempts: u32,
    },
}

impl StreamError {
    /// Whether the stream has stopped trying to recover.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::GaveUp { .. })
    }

    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Dial { .. } => "dial",
            Self::HandshakeTimeout { .. } => "handshake_timeout",
            Self::Read { .. } => "read",
            Self::GaveUp { .. } => "gave_up",
        }
    }
}

/// Receiving side of a running tick source.
///
/// `ticks` is backpressured: the producer waits when it is full. `errors`
/// is lossy: the producer drops an error when the previous one is still
/// pending. Both close when the producer task ends.
#[derive(Debug)]
pub struct TickStream {
    /// Decoded ticks in wire order.
    pub ticks: mpsc::Receiver<Tick>,
    /// Best-effort error reports.
    pub errors: mpsc::Receiver<StreamError>,
    /// Latest connection state.
    pub state: watch::Receiver<ConnectionState>,
}

/// Sending side handed to the producer task.
#[derive(Debug)]
pub struct TickStreamSender {
    /// Tick queue.
    pub ticks: mpsc::Sender<Tick>,
    /// Error queue.
    pub errors: mpsc::Sender<StreamError>,
    /// Connection state publisher.
    pub state: watch::Sender<ConnectionState>,
}

/// Capacity of the error queue.
pub const ERROR_QUEUE_CAPACITY: usize = 1;

/// Create a connected sender/receiver pair with the given tick capacity.
#[must_use]
pub fn tick_channel(tick_capacity: usize) -> (TickStreamSender, TickStream) {
    let (tick_tx, tick_rx) = mpsc::channel(tick_capacity.max(1));
    let (error_tx, error_rx) = mpsc::channel(ERROR_QUEUE_CAPACITY);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

    (
        TickStreamSender {
            ticks: tick_tx,
            errors: error_tx,
            state: state_tx,
        },
        TickStream {
            ticks: tick_rx,
            errors: error_rx,
            state: state_rx,
        },
    )
}

impl TickStreamSender {
    /// Report an error without waiting. Returns `false` if it was dropped.
    pub fn report(&self, error: StreamError) -> bool {
        match self.errors.try_send(error) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::debug!(error = %dropped, "Error queue full, dropping report");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Publish a state transition.
    pub fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

/// Port for a source of ticks.
pub trait TickStreamPort: Send + Sync {
    /// Start streaming ticks for `symbol` until `cancel` fires.
    ///
    /// Must be called from within a tokio runtime.
    fn stream(&self, cancel: CancellationToken, symbol: &str) -> TickStream;
}
