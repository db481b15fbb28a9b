//! Ingestion Orchestrator
//!
//! Wires a tick source to a tick sink. A single consume loop persists every
//! tick in arrival order; persistence failures are logged and counted but
//! never stop ingestion. The loop ends when the source closes, when the
//! source reports a fatal error, or on cancellation after draining whatever
//! is already queued. Before returning after a cancellation or a fatal
//! error, the loop waits (bounded) for the source to report `Closed` so its
//! close handshake is not cut off.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    ConnectionState, SinkError, StreamError, TickSinkPort, TickStream, TickStreamPort,
};
use crate::domain::Tick;
use crate::infrastructure::metrics;

/// How long to wait for the source to finish closing after the loop ends.
pub const SOURCE_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Counters for one orchestrator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks taken off the queue.
    pub received: u64,
    /// Ticks newly stored.
    pub persisted: u64,
    /// Ticks already present in the sink.
    pub duplicates: u64,
    /// Ticks the sink rejected.
    pub failed: u64,
}

/// Orchestrator errors.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The tick source gave up.
    #[error("tick stream failed: {source}")]
    Stream {
        /// Fatal stream error.
        #[source]
        source: StreamError,
        /// Work done before the failure.
        summary: RunSummary,
    },
}

/// Consumes a tick source into a tick sink.
pub struct Orchestrator {
    streamer: Arc<dyn TickStreamPort>,
    sink: Arc<dyn TickSinkPort>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(streamer: Arc<dyn TickStreamPort>, sink: Arc<dyn TickSinkPort>) -> Self {
        Self { streamer, sink }
    }

    /// Ingest `symbol` until the source ends or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Stream`] if the source reports a fatal
    /// error. Ticks queued before it are still persisted.
    pub async fn run(
        &self,
        cancel: CancellationToken,
        symbol: &str,
    ) -> Result<RunSummary, OrchestratorError> {
        let TickStream {
            mut ticks,
            mut errors,
            mut state,
        } = self.streamer.stream(cancel.clone(), symbol);

        let mut summary = RunSummary::default();
        let mut errors_open = true;

        tracing::info!(symbol, "Ingestion started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!("Shutdown requested, draining queued ticks");
                    ticks.close();
                    self.drain(&mut ticks, &mut summary).await;
                    await_source_closed(&mut state).await;
                    break;
                }
                received = ticks.recv() => {
                    let Some(tick) = received else {
                        // Source ended; a fatal error may still be queued
                        if let Some(fatal) = take_fatal(&mut errors) {
                            return Err(fail(fatal, summary));
                        }
                        tracing::info!("Tick stream ended");
                        break;
                    };
                    self.persist(&tick, &mut summary).await;
                }
                reported = errors.recv(), if errors_open => match reported {
                    Some(error) if error.is_fatal() => {
                        self.drain(&mut ticks, &mut summary).await;
                        await_source_closed(&mut state).await;
                        return Err(fail(error, summary));
                    }
                    Some(error) => {
                        tracing::warn!(error = %error, kind = error.kind(), "Tick stream error");
                    }
                    None => errors_open = false,
                },
            }
        }

        tracing::info!(
            received = summary.received,
            persisted = summary.persisted,
            duplicates = summary.duplicates,
            failed = summary.failed,
            "Ingestion stopped"
        );

        Ok(summary)
    }

    async fn drain(&self, ticks: &mut mpsc::Receiver<Tick>, summary: &mut RunSummary) {
        while let Some(tick) = ticks.recv().await {
            self.persist(&tick, summary).await;
        }
    }

    async fn persist(&self, tick: &Tick, summary: &mut RunSummary) {
        summary.received += 1;
        let started = Instant::now();

        match self.sink.insert(tick).await {
            Ok(()) => {
                summary.persisted += 1;
                metrics::record_tick_persisted(started.elapsed());
                tracing::debug!(
                    symbol = tick.symbol(),
                    event_time = tick.event_time(),
                    price = %tick.last_price(),
                    "Tick stored"
                );
            }
            Err(SinkError::Duplicate { symbol, event_time }) => {
                summary.duplicates += 1;
                tracing::debug!(%symbol, event_time, "Tick already stored");
            }
            Err(e) => {
                summary.failed += 1;
                metrics::record_persist_failure(e.kind());
                tracing::warn!(
                    error = %e,
                    symbol = tick.symbol(),
                    event_time = tick.event_time(),
                    "Failed to store tick"
                );
            }
        }
    }
}

async fn await_source_closed(state: &mut watch::Receiver<ConnectionState>) {
    match tokio::time::timeout(SOURCE_CLOSE_GRACE, state.wait_for(ConnectionState::is_terminal))
        .await
    {
        // Err here means the producer is already gone
        Ok(_) => tracing::debug!("Tick source closed"),
        Err(_) => tracing::warn!(
            grace_ms = SOURCE_CLOSE_GRACE.as_millis(),
            "Tick source did not close in time"
        ),
    }
}

fn take_fatal(errors: &mut mpsc::Receiver<StreamError>) -> Option<StreamError> {
    while let Ok(error) = errors.try_recv() {
        if error.is_fatal() {
            return Some(error);
        }
        tracing::warn!(error = %error, kind = error.kind(), "Tick stream error");
    }
    None
}

fn fail(source: StreamError, summary: RunSummary) -> OrchestratorError {
    tracing::error!(error = %source, "Tick stream failed");
    OrchestratorError::Stream { source, summary }
}
