//! Pipeline Integration Tests
//!
//! Mock streamer through the orchestrator into a sink.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use tick_ingest::{MemorySink, MockStreamer, Orchestrator, TickSinkPort, TursoSink};

#[tokio::test]
async fn mock_ticks_are_persisted_until_shutdown() {
    let sink = Arc::new(MemorySink::new());
    let streamer = Arc::new(MockStreamer::new(
        Duration::from_millis(20),
        BigDecimal::from(100),
        8,
    ));
    let orchestrator = Orchestrator::new(streamer, Arc::clone(&sink) as Arc<dyn TickSinkPort>);
    let cancel = CancellationToken::new();

    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { orchestrator.run(cancel, "BTCUSDT").await }
    });

    tokio::time::sleep(Duration::from_millis(250)).await;
    cancel.cancel();

    let summary = timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(summary.persisted >= 3, "{summary:?}");
    assert_eq!(
        summary.received,
        summary.persisted + summary.duplicates + summary.failed
    );
    assert_eq!(summary.failed, 0);

    let rows = sink.rows();
    assert_eq!(rows.len() as u64, summary.persisted);
    assert!(rows.iter().all(|row| row.event_kind == "mock"));
    assert!(rows.iter().all(|row| row.volume.split('.').nth(1).unwrap().len() >= 8));

    let prices: Vec<BigDecimal> = rows
        .iter()
        .map(|row| row.last_price.parse().unwrap())
        .collect();
    assert!(prices.windows(2).all(|pair| pair[0] < pair[1]), "{prices:?}");
}

#[tokio::test]
async fn mock_ticks_reach_turso() {
    let sink = Arc::new(
        TursoSink::open(":memory:", Duration::from_secs(3))
            .await
            .unwrap(),
    );
    let streamer = Arc::new(MockStreamer::new(
        Duration::from_millis(10),
        BigDecimal::from(100),
        8,
    ));
    let orchestrator = Orchestrator::new(streamer, Arc::clone(&sink) as Arc<dyn TickSinkPort>);
    let cancel = CancellationToken::new();

    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { orchestrator.run(cancel, "BTCUSDT").await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let summary = timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(summary.persisted >= 1, "{summary:?}");
    assert_eq!(summary.failed, 0);
    sink.close().await.unwrap();
}
