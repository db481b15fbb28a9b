//! Turso Tick Sink
//!
//! Durable sink on the embedded, SQLite-compatible `turso` engine. One
//! connection is opened at startup; it sits behind an async mutex only so
//! that `close` can take it away from in-flight callers.
//!
//! Every operation is bounded by `op_timeout`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use turso::params::Params;
use turso::{Builder, Connection, Database, Row, Value};

use crate::application::ports::{SinkError, TickSinkPort};
use crate::domain::Tick;

use super::row::StoredTick;

/// Default bound for a single sink operation.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(3);

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS ticks (
    event_kind TEXT NOT NULL,
    event_time INTEGER NOT NULL,
    symbol TEXT NOT NULL,
    last_price TEXT NOT NULL,
    volume TEXT NOT NULL,
    open_time INTEGER NOT NULL,
    close_time INTEGER NOT NULL,
    trade_count INTEGER NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (symbol, event_time)
)";

const INSERT_TICK: &str = "
INSERT INTO ticks (event_kind, event_time, symbol, last_price, volume, open_time, close_time, trade_count)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

const EXISTS_TICK: &str = "SELECT 1 FROM ticks WHERE symbol = ? AND event_time = ? LIMIT 1";

const SELECT_BY_EVENT_TIME: &str = "
SELECT event_kind, event_time, symbol, last_price, volume, open_time, close_time, trade_count
FROM ticks WHERE event_time = ? ORDER BY symbol LIMIT 1";

struct Handle {
    // Held so the database outlives its connection.
    _db: Database,
    conn: Connection,
}

/// Durable tick sink.
pub struct TursoSink {
    handle: Mutex<Option<Handle>>,
    op_timeout: Duration,
}

impl std::fmt::Debug for TursoSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TursoSink")
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

impl TursoSink {
    /// Open (or create) the database at `path` and ensure the schema exists.
    ///
    /// `path` may be `:memory:` for a throwaway database.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Storage`] if the database cannot be opened or
    /// the schema cannot be created, and [`SinkError::Timeout`] if that
    /// takes longer than `op_timeout`.
    pub async fn open(path: &str, op_timeout: Duration) -> Result<Self, SinkError> {
        let handle = bounded("open", op_timeout, async {
            let db = Builder::new_local(path).build().await.map_err(storage)?;
            let conn = db.connect().map_err(storage)?;
            conn.execute(CREATE_TABLE, ()).await.map_err(storage)?;
            Ok(Handle { _db: db, conn })
        })
        .await?;

        tracing::info!(path, "Tick store opened");

        Ok(Self {
            handle: Mutex::new(Some(handle)),
            op_timeout,
        })
    }
}

#[async_trait]
impl TickSinkPort for TursoSink {
    async fn insert(&self, tick: &Tick) -> Result<(), SinkError> {
        let row = StoredTick::from(tick);

        bounded("insert", self.op_timeout, async {
            let guard = self.handle.lock().await;
            let handle = guard.as_ref().ok_or(SinkError::Closed)?;

            let mut existing = handle
                .conn
                .query(
                    EXISTS_TICK,
                    Params::Positional(vec![
                        Value::Text(row.symbol.clone()),
                        Value::Integer(row.event_time),
                    ]),
                )
                .await
                .map_err(storage)?;
            if existing.next().await.map_err(storage)?.is_some() {
                return Err(duplicate(&row));
            }

            handle
                .conn
                .execute(INSERT_TICK, insert_params(&row))
                .await
                .map_err(|e| {
                    let message = e.to_string();
                    if message.contains("UNIQUE constraint") {
                        duplicate(&row)
                    } else {
                        SinkError::Storage(message)
                    }
                })?;

            Ok(())
        })
        .await
    }

    async fn lookup(&self, event_time: i64) -> Result<Option<Tick>, SinkError> {
        let row = bounded("lookup", self.op_timeout, async {
            let guard = self.handle.lock().await;
            let handle = guard.as_ref().ok_or(SinkError::Closed)?;

            let mut rows = handle
                .conn
                .query(
                    SELECT_BY_EVENT_TIME,
                    Params::Positional(vec![Value::Integer(event_time)]),
                )
                .await
                .map_err(storage)?;

            match rows.next().await.map_err(storage)? {
                Some(row) => read_row(&row).map(Some),
                None => Ok(None),
            }
        })
        .await?;

        row.map(Tick::try_from).transpose()
    }

    async fn close(&self) -> Result<(), SinkError> {
        bounded("close", self.op_timeout, async {
            let handle = self.handle.lock().await.take().ok_or(SinkError::Closed)?;
            drop(handle);
            tracing::info!("Tick store closed");
            Ok(())
        })
        .await
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn bounded<T, F>(operation: &'static str, timeout: Duration, fut: F) -> Result<T, SinkError>
where
    F: Future<Output = Result<T, SinkError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| SinkError::Timeout { operation, timeout })?
}

#[allow(clippy::needless_pass_by_value)]
fn storage(err: turso::Error) -> SinkError {
    SinkError::Storage(err.to_string())
}

fn duplicate(row: &StoredTick) -> SinkError {
    SinkError::Duplicate {
        symbol: row.symbol.clone(),
        event_time: row.event_time,
    }
}

fn insert_params(row: &StoredTick) -> Params {
    Params::Positional(vec![
        Value::Text(row.event_kind.clone()),
        Value::Integer(row.event_time),
        Value::Text(row.symbol.clone()),
        Value::Text(row.last_price.clone()),
        Value::Text(row.volume.clone()),
        Value::Integer(row.open_time),
        Value::Integer(row.close_time),
        Value::Integer(row.trade_count),
    ])
}

fn read_row(row: &Row) -> Result<StoredTick, SinkError> {
    Ok(StoredTick {
        event_kind: text(row, 0, "event_kind")?,
        event_time: integer(row, 1, "event_time")?,
        symbol: text(row, 2, "symbol")?,
        last_price: text(row, 3, "last_price")?,
        volume: text(row, 4, "volume")?,
        open_time: integer(row, 5, "open_time")?,
        close_time: integer(row, 6, "close_time")?,
        trade_count: integer(row, 7, "trade_count")?,
    })
}

fn text(row: &Row, idx: usize, column: &str) -> Result<String, SinkError> {
    match row.get_value(idx).map_err(storage)? {
        Value::Text(value) => Ok(value),
        other => Err(SinkError::Corrupt(format!(
            "{column}: expected text, got {other:?}"
        ))),
    }
}

fn integer(row: &Row, idx: usize, column: &str) -> Result<i64, SinkError> {
    match row.get_value(idx).map_err(storage)? {
        Value::Integer(value) => Ok(value),
        other => Err(SinkError::Corrupt(format!(
            "{column}: expected integer, got {other:?}"
        ))),
    }
}
