//! Connection Supervisor
//!
//! Owns one logical feed connection and keeps it alive until cancelled:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Closing -> Closed
//!                     ^             |
//!                     |             v
//!                     +------ Reconnecting
//! ```
//!
//! Dial failures, handshake timeouts and read failures are reported on the
//! error queue and followed by a backoff sleep. A read deadline expiring is
//! not a failure; it only gives the loop a chance to observe cancellation.
//! Messages that fail to decode are logged and skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    ConnectionState, StreamError, TickStream, TickStreamPort, TickStreamSender, tick_channel,
};
use crate::infrastructure::metrics;

use super::codec::TickerCodec;
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::transport::{FeedConnection, FeedDialer};

/// Default feed host.
pub const DEFAULT_FEED_HOST: &str = "stream.binance.com:9443";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the connection supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Feed host, optionally with port.
    pub host: String,
    /// Dial `wss://` (true) or plain `ws://` (false).
    pub tls: bool,
    /// Upper bound for dial plus handshake.
    pub handshake_timeout: Duration,
    /// Deadline for a single read.
    pub read_timeout: Duration,
    /// Upper bound for the graceful close handshake.
    pub close_timeout: Duration,
    /// Tick queue capacity.
    pub tick_capacity: usize,
    /// Reconnection backoff.
    pub reconnect: ReconnectConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FEED_HOST.to_string(),
            tls: true,
            handshake_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(5),
            close_timeout: Duration::from_secs(1),
            tick_capacity: 32,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl SupervisorConfig {
    /// Ticker stream URL for `symbol`.
    #[must_use]
    pub fn endpoint(&self, symbol: &str) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        format!("{scheme}://{}/ws/{}@ticker", self.host, symbol.to_lowercase())
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// Live ticker source with automatic reconnection.
#[derive(Debug)]
pub struct ConnectionSupervisor<D> {
    dialer: Arc<D>,
    config: SupervisorConfig,
}

impl<D: FeedDialer> ConnectionSupervisor<D> {
    /// Create a supervisor that dials through `dialer`.
    #[must_use]
    pub fn new(dialer: D, config: SupervisorConfig) -> Self {
        Self {
            dialer: Arc::new(dialer),
            config,
        }
    }

    /// Supervisor configuration.
    #[must_use]
    pub const fn config(&self) -> &SupervisorConfig {
        &self.config
    }
}

impl<D: FeedDialer> TickStreamPort for ConnectionSupervisor<D> {
    fn stream(&self, cancel: CancellationToken, symbol: &str) -> TickStream {
        let (tx, rx) = tick_channel(self.config.tick_capacity);

        let task = SupervisorTask {
            dialer: Arc::clone(&self.dialer),
            url: self.config.endpoint(symbol),
            config: self.config.clone(),
            codec: TickerCodec::new(),
            tx,
            cancel,
        };
        tokio::spawn(task.run());

        rx
    }
}

/// How a read loop ended.
enum ReadOutcome {
    /// Cancellation requested.
    Cancelled,
    /// Tick queue receiver dropped.
    ConsumerGone,
    /// Connection failed; reconnect.
    Failed(String),
}

/// State owned by the spawned supervisor task. Dropping it closes both
/// queues.
struct SupervisorTask<D: FeedDialer> {
    dialer: Arc<D>,
    url: String,
    config: SupervisorConfig,
    codec: TickerCodec,
    tx: TickStreamSender,
    cancel: CancellationToken,
}

impl<D: FeedDialer> SupervisorTask<D> {
    async fn run(self) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            tracing::info!(url = %self.url, "Connecting to ticker stream");

            let dialed = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = tokio::time::timeout(
                    self.config.handshake_timeout,
                    self.dialer.dial(&self.url),
                ) => result,
            };

            let error = match dialed {
                Ok(Ok(mut conn)) => {
                    policy.reset();
                    self.set_state(ConnectionState::Connected);
                    tracing::info!(url = %self.url, "Ticker stream connected");

                    match self.read_loop(&mut conn).await {
                        ReadOutcome::Cancelled => {
                            self.close_gracefully(&mut conn).await;
                            break;
                        }
                        ReadOutcome::ConsumerGone => {
                            tracing::info!("Tick consumer gone, closing stream");
                            self.close_gracefully(&mut conn).await;
                            break;
                        }
                        ReadOutcome::Failed(reason) => StreamError::Read { reason },
                    }
                }
                Ok(Err(e)) => StreamError::Dial {
                    url: self.url.clone(),
                    reason: e.to_string(),
                },
                Err(_) => StreamError::HandshakeTimeout {
                    url: self.url.clone(),
                    timeout: self.config.handshake_timeout,
                },
            };

            tracing::warn!(error = %error, "Ticker stream error");
            self.report(error);
            self.set_state(ConnectionState::Reconnecting);

            let Some(delay) = policy.next_delay() else {
                let attempts = policy.attempt_count();
                tracing::error!(attempts, "Reconnection limit reached, giving up");
                self.report_fatal(StreamError::GaveUp { attempts }).await;
                break;
            };

            metrics::record_reconnect();
            tracing::info!(
                attempt = policy.attempt_count(),
                delay_ms = delay.as_millis(),
                "Reconnecting to ticker stream"
            );

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::info!("Cancelled during reconnect delay");
                    break;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Closed);
        tracing::info!(url = %self.url, "Ticker stream closed");
    }

    async fn read_loop(&self, conn: &mut D::Connection) -> ReadOutcome {
        loop {
            let received = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return ReadOutcome::Cancelled,
                result = tokio::time::timeout(self.config.read_timeout, conn.recv()) => result,
            };

            let payload = match received {
                // Deadline only bounds the wait
                Err(_) => continue,
                Ok(Err(e)) => return ReadOutcome::Failed(e.to_string()),
                Ok(Ok(payload)) => payload,
            };

            let tick = match self.codec.decode(&payload) {
                Ok(tick) => tick,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable ticker message");
                    metrics::record_decode_failure();
                    continue;
                }
            };

            metrics::record_tick_received(tick.symbol());

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return ReadOutcome::Cancelled,
                sent = self.tx.ticks.send(tick) => {
                    if sent.is_err() {
                        return ReadOutcome::ConsumerGone;
                    }
                }
            }
        }
    }

    async fn close_gracefully(&self, conn: &mut D::Connection) {
        self.set_state(ConnectionState::Closing);

        match tokio::time::timeout(self.config.close_timeout, conn.close()).await {
            Ok(Ok(())) => tracing::debug!("Close handshake complete"),
            Ok(Err(e)) => tracing::debug!(error = %e, "Close handshake failed"),
            Err(_) => tracing::debug!("Close handshake timed out"),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        tracing::debug!(state = state.as_str(), "Connection state changed");
        self.tx.set_state(state);
        metrics::set_connection_state(state);
    }

    fn report(&self, error: StreamError) {
        metrics::record_stream_error(error.kind());
        self.tx.report(error);
    }

    /// Fatal errors wait for queue space so the consumer always sees them.
    async fn report_fatal(&self, error: StreamError) {
        metrics::record_stream_error(error.kind());
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {}
            _ = self.tx.errors.send(error) => {}
        }
    }
}
