//! In-Memory Tick Sink
//!
//! Same keying and row encoding as the durable sink, held in a `BTreeMap`.
//! Backs `TICK_INGEST_DRY_RUN` and the pipeline tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::application::ports::{SinkError, TickSinkPort};
use crate::domain::Tick;

use super::row::StoredTick;

#[derive(Debug, Default)]
struct Inner {
    rows: BTreeMap<(String, i64), StoredTick>,
    closed: bool,
}

/// Process-local tick sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    inner: Mutex<Inner>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().rows.len()
    }

    /// Whether nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().rows.is_empty()
    }

    /// Stored rows ordered by `(symbol, event_time)`.
    #[must_use]
    pub fn rows(&self) -> Vec<StoredTick> {
        self.inner.lock().rows.values().cloned().collect()
    }
}

#[async_trait]
impl TickSinkPort for MemorySink {
    async fn insert(&self, tick: &Tick) -> Result<(), SinkError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SinkError::Closed);
        }

        let key = (tick.symbol().to_string(), tick.event_time());
        if inner.rows.contains_key(&key) {
            return Err(SinkError::Duplicate {
                symbol: key.0,
                event_time: key.1,
            });
        }

        inner.rows.insert(key, StoredTick::from(tick));
        Ok(())
    }

    async fn lookup(&self, event_time: i64) -> Result<Option<Tick>, SinkError> {
        let row = {
            let inner = self.inner.lock();
            if inner.closed {
                return Err(SinkError::Closed);
            }
            inner
                .rows
                .values()
                .find(|row| row.event_time == event_time)
                .cloned()
        };

        row.map(Tick::try_from).transpose()
    }

    async fn close(&self) -> Result<(), SinkError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SinkError::Closed);
        }
        inner.closed = true;
        inner.rows.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TickParts;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn tick(symbol: &str, event_time: i64) -> Tick {
        Tick::try_from(TickParts {
            event_kind: "24hrTicker".to_string(),
            event_time,
            symbol: symbol.to_string(),
            last_price: BigDecimal::from_str("16730.06").unwrap(),
            volume: BigDecimal::from_str("202438.852").unwrap(),
            open_time: event_time - 60_000,
            close_time: event_time,
            trade_count: 3,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn insert_then_lookup() {
        let sink = MemorySink::new();
        let original = tick("BTCUSDT", 10);

        sink.insert(&original).await.unwrap();

        assert_eq!(sink.lookup(10).await.unwrap(), Some(original));
        assert_eq!(sink.lookup(11).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_leaves_row_untouched() {
        let sink = MemorySink::new();
        sink.insert(&tick("BTCUSDT", 10)).await.unwrap();

        let err = sink.insert(&tick("BTCUSDT", 10)).await.unwrap_err();

        assert_eq!(
            err,
            SinkError::Duplicate {
                symbol: "BTCUSDT".to_string(),
                event_time: 10
            }
        );
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn same_time_different_symbol_is_allowed() {
        let sink = MemorySink::new();
        sink.insert(&tick("ETHUSDT", 10)).await.unwrap();
        sink.insert(&tick("BTCUSDT", 10)).await.unwrap();

        let found = sink.lookup(10).await.unwrap().unwrap();
        assert_eq!(found.symbol(), "BTCUSDT");
    }

    #[tokio::test]
    async fn operations_after_close_fail() {
        let sink = MemorySink::new();
        sink.close().await.unwrap();

        assert_eq!(
            sink.insert(&tick("BTCUSDT", 1)).await,
            Err(SinkError::Closed)
        );
        assert_eq!(sink.lookup(1).await, Err(SinkError::Closed));
        assert_eq!(sink.close().await, Err(SinkError::Closed));
    }
}
