//! Live Feed Integration Tests
//!
//! Runs the connection supervisor against a local WebSocket server that
//! drops the first connection mid-stream.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use tick_ingest::infrastructure::feed::ReconnectConfig;
use tick_ingest::infrastructure::feed::transport::MAX_MESSAGE_SIZE;
use tick_ingest::{
    ConnectionState, ConnectionSupervisor, MemorySink, Orchestrator, StreamError,
    SupervisorConfig, TickSinkPort, TickStreamPort, WebSocketDialer, format_full,
};

const WAIT: Duration = Duration::from_secs(5);

fn ticker(event_time: i64, price: &str) -> String {
    format!(
        r#"{{"e":"24hrTicker","E":{event_time},"s":"BTCUSDT","c":"{price}","v":"202438.852","O":0,"C":{event_time},"n":1603775}}"#
    )
}

/// First connection: two ticks, then an abrupt drop. Second connection:
/// one tick, an undecodable frame, another tick, then idle until closed.
async fn serve(listener: TcpListener) {
    let (socket, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
    ws.send(Message::Text(ticker(1, "16730.06000000").into()))
        .await
        .unwrap();
    ws.send(Message::Text(ticker(2, "16730.07000000").into()))
        .await
        .unwrap();
    drop(ws);

    let (socket, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
    ws.send(Message::Text(ticker(3, "16730.08000000").into()))
        .await
        .unwrap();
    ws.send(Message::Text("{\"e\":\"24hrTicker\"}".into()))
        .await
        .unwrap();
    ws.send(Message::Text(ticker(4, "0.0000000123456789012345678").into()))
        .await
        .unwrap();

    while let Some(Ok(_)) = ws.next().await {}
}

#[tokio::test]
async fn reconnects_after_drop_and_keeps_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve(listener));

    let config = SupervisorConfig {
        host: addr.to_string(),
        tls: false,
        read_timeout: Duration::from_millis(200),
        reconnect: ReconnectConfig::doubling(Duration::from_millis(50), Duration::from_secs(1)),
        ..SupervisorConfig::default()
    };
    let supervisor = ConnectionSupervisor::new(WebSocketDialer::new(), config);
    let cancel = CancellationToken::new();

    let mut stream = supervisor.stream(cancel.clone(), "BTCUSDT");

    let mut event_times = Vec::new();
    let mut last_price = None;
    for _ in 0..4 {
        let tick = timeout(WAIT, stream.ticks.recv()).await.unwrap().unwrap();
        event_times.push(tick.event_time());
        last_price = Some(format_full(tick.last_price()));
    }

    assert_eq!(event_times, vec![1, 2, 3, 4]);
    assert_eq!(last_price.unwrap(), "0.0000000123456789012345678");

    let error = timeout(WAIT, stream.errors.recv()).await.unwrap().unwrap();
    assert!(matches!(error, StreamError::Read { .. }), "{error:?}");
    assert!(!error.is_fatal());

    cancel.cancel();

    assert!(timeout(WAIT, stream.ticks.recv()).await.unwrap().is_none());
    timeout(WAIT, server).await.unwrap().unwrap();
    assert_eq!(*stream.state.borrow(), ConnectionState::Closed);
}

#[tokio::test]
async fn refused_dial_is_reported_and_retried() {
    // Bind then drop to get a port nobody listens on
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let config = SupervisorConfig {
        host: addr.to_string(),
        tls: false,
        reconnect: ReconnectConfig::doubling(Duration::from_millis(10), Duration::from_millis(20)),
        ..SupervisorConfig::default()
    };
    let supervisor = ConnectionSupervisor::new(WebSocketDialer::new(), config);
    let cancel = CancellationToken::new();

    let mut stream = supervisor.stream(cancel.clone(), "BTCUSDT");

    for _ in 0..2 {
        let error = timeout(WAIT, stream.errors.recv()).await.unwrap().unwrap();
        assert!(matches!(error, StreamError::Dial { .. }), "{error:?}");
    }

    cancel.cancel();
    assert!(timeout(WAIT, stream.ticks.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn shutdown_sends_close_frame_before_run_returns() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        ws.send(Message::Text(ticker(1, "16730.06000000").into()))
            .await
            .unwrap();
        let mut saw_close = false;
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                saw_close = true;
                break;
            }
        }
        let _ = closed_tx.send(saw_close);
    });

    let config = SupervisorConfig {
        host: addr.to_string(),
        tls: false,
        ..SupervisorConfig::default()
    };
    let streamer = Arc::new(ConnectionSupervisor::new(WebSocketDialer::new(), config));
    let sink = Arc::new(MemorySink::new());
    let orchestrator = Orchestrator::new(streamer, Arc::clone(&sink) as Arc<dyn TickSinkPort>);
    let cancel = CancellationToken::new();

    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { orchestrator.run(cancel, "BTCUSDT").await }
    });

    timeout(WAIT, async {
        while sink.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    cancel.cancel();
    let summary = timeout(WAIT, run).await.unwrap().unwrap().unwrap();
    assert_eq!(summary.persisted, 1);

    // The frame was flushed before run returned; the server only has to read it
    assert!(timeout(WAIT, closed_rx).await.unwrap().unwrap());
}

#[tokio::test]
async fn oversized_message_fails_connection_and_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        let oversized = format!(r#"{{"pad":"{}"}}"#, "x".repeat(MAX_MESSAGE_SIZE + 1));
        // The client may drop the socket mid-write
        let _ = ws.send(Message::Text(oversized.into())).await;

        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        ws.send(Message::Text(ticker(1, "16730.06000000").into()))
            .await
            .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let config = SupervisorConfig {
        host: addr.to_string(),
        tls: false,
        reconnect: ReconnectConfig::doubling(Duration::from_millis(20), Duration::from_millis(100)),
        ..SupervisorConfig::default()
    };
    let supervisor = ConnectionSupervisor::new(WebSocketDialer::new(), config);
    let cancel = CancellationToken::new();
    let mut stream = supervisor.stream(cancel.clone(), "BTCUSDT");

    let error = timeout(WAIT, stream.errors.recv()).await.unwrap().unwrap();
    assert!(matches!(error, StreamError::Read { .. }), "{error:?}");

    let tick = timeout(WAIT, stream.ticks.recv()).await.unwrap().unwrap();
    assert_eq!(tick.event_time(), 1);

    cancel.cancel();
    assert!(timeout(WAIT, stream.ticks.recv()).await.unwrap().is_none());
    timeout(WAIT, server).await.unwrap().unwrap();
}
