//! Synthetic Ticker Source
//!
//! Emits a deterministic upward walk at a fixed interval so the pipeline can
//! run without an exchange connection. Each tick raises the price by 0.01
//! and the volume by 0.1; the first tick arrives one interval after start.

use std::time::Duration;

use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ConnectionState, TickStream, TickStreamPort, tick_channel};
use crate::domain::{MOCK_EVENT_KIND, Tick, TickParts};

/// Default emission interval.
pub const DEFAULT_MOCK_INTERVAL: Duration = Duration::from_millis(500);

/// Starting price used when none (or a non-positive one) is configured.
pub const DEFAULT_BASE_PRICE: u32 = 100;

/// Window length reported in `open_time`.
const WINDOW_MS: i64 = 60_000;

/// Synthetic tick generator.
#[derive(Debug, Clone)]
pub struct MockStreamer {
    interval: Duration,
    base_price: BigDecimal,
    tick_capacity: usize,
}

impl MockStreamer {
    /// Create a generator. A zero interval falls back to 500 ms and a
    /// non-positive base price to 100.
    #[must_use]
    pub fn new(interval: Duration, base_price: BigDecimal, tick_capacity: usize) -> Self {
        Self {
            interval: if interval.is_zero() {
                DEFAULT_MOCK_INTERVAL
            } else {
                interval
            },
            base_price: if base_price > BigDecimal::zero() {
                base_price
            } else {
                BigDecimal::from(DEFAULT_BASE_PRICE)
            },
            tick_capacity,
        }
    }

    /// Emission interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl TickStreamPort for MockStreamer {
    fn stream(&self, cancel: CancellationToken, symbol: &str) -> TickStream {
        let (tx, rx) = tick_channel(self.tick_capacity);
        let interval = self.interval;
        let mut price = self.base_price.clone();
        let symbol = symbol.to_string();

        tokio::spawn(async move {
            let price_step = BigDecimal::new(BigInt::from(1), 2);
            let volume_step = BigDecimal::new(BigInt::from(1), 1);
            let mut volume = BigDecimal::from(1);

            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tx.set_state(ConnectionState::Connected);
            tracing::info!(%symbol, interval_ms = interval.as_millis(), "Mock streamer started");

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                price = &price + &price_step;
                volume = &volume + &volume_step;

                let now = Utc::now().timestamp_millis();
                let tick = match Tick::try_from(TickParts {
                    event_kind: MOCK_EVENT_KIND.to_string(),
                    event_time: now,
                    symbol: symbol.clone(),
                    last_price: price.clone(),
                    volume: volume.clone(),
                    open_time: now - WINDOW_MS,
                    close_time: now,
                    trade_count: 1,
                }) {
                    Ok(tick) => tick,
                    Err(e) => {
                        tracing::error!(error = %e, "Mock streamer cannot build ticks");
                        break;
                    }
                };

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    sent = tx.ticks.send(tick) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }

            tx.set_state(ConnectionState::Closed);
            tracing::info!(%symbol, "Mock streamer stopped");
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::numeric::format_full;
    use std::str::FromStr;

    #[test]
    fn defaults_for_invalid_parameters() {
        let streamer = MockStreamer::new(Duration::ZERO, BigDecimal::zero(), 8);
        assert_eq!(streamer.interval(), DEFAULT_MOCK_INTERVAL);
        assert_eq!(streamer.base_price, BigDecimal::from(100));
    }

    #[tokio::test(start_paused = true)]
    async fn prices_strictly_increase_by_one_cent() {
        let base = BigDecimal::from_str("100.0").unwrap();
        let streamer = MockStreamer::new(Duration::from_millis(500), base, 8);
        let cancel = CancellationToken::new();
        let mut stream = streamer.stream(cancel.clone(), "BTCUSDT");

        let mut ticks = Vec::new();
        for _ in 0..5 {
            ticks.push(stream.ticks.recv().await.unwrap());
        }
        cancel.cancel();

        assert_eq!(format_full(ticks[0].last_price()), "100.01");
        assert_eq!(ticks[0].volume(), &BigDecimal::from_str("1.1").unwrap());
        for pair in ticks.windows(2) {
            assert_eq!(
                pair[1].last_price() - pair[0].last_price(),
                BigDecimal::new(BigInt::from(1), 2)
            );
            assert!(pair[1].volume() > pair[0].volume());
        }

        let first = &ticks[0];
        assert!(first.is_mock());
        assert_eq!(first.symbol(), "BTCUSDT");
        assert_eq!(first.trade_count(), 1);
        assert_eq!(first.close_time() - first.open_time(), WINDOW_MS);
        assert_eq!(first.event_time(), first.close_time());
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_interval() {
        let streamer = MockStreamer::new(Duration::from_secs(2), BigDecimal::from(100), 8);
        let cancel = CancellationToken::new();
        let mut stream = streamer.stream(cancel.clone(), "ETHUSDT");

        let started = Instant::now();
        stream.ticks.recv().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_closes_queues() {
        let streamer = MockStreamer::new(Duration::from_secs(60), BigDecimal::from(100), 8);
        let cancel = CancellationToken::new();
        let mut stream = streamer.stream(cancel.clone(), "BTCUSDT");

        cancel.cancel();

        assert!(stream.ticks.recv().await.is_none());
        assert!(stream.errors.recv().await.is_none());
    }
}
