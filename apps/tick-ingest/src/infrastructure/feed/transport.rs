//! Feed Transport
//!
//! The connection supervisor talks to the network only through
//! [`FeedDialer`] and [`FeedConnection`]. Production uses
//! [`WebSocketDialer`] (tokio-tungstenite over rustls); tests plug in a
//! scripted transport.
//!
//! A `FeedConnection` yields data payloads only. Ping/pong and other control
//! frames are handled inside the implementation; a close frame or the end of
//! the stream is reported as [`TransportError::Closed`]. Messages larger than
//! [`MAX_MESSAGE_SIZE`] are refused by the protocol layer before they are
//! buffered, which fails the connection.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Maximum accepted payload size, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// WebSocket protocol or network error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Socket-level I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote closed the connection or the stream ended.
    #[error("connection closed: {0}")]
    Closed(String),
}

/// Opens connections to a feed endpoint.
#[async_trait]
pub trait FeedDialer: Send + Sync + 'static {
    /// Connection type produced by this dialer.
    type Connection: FeedConnection;

    /// Dial `url` and complete the handshake.
    async fn dial(&self, url: &str) -> Result<Self::Connection, TransportError>;
}

/// One established feed connection.
#[async_trait]
pub trait FeedConnection: Send + 'static {
    /// Wait for the next data payload.
    ///
    /// Must be cancel-safe: dropping the future before it completes must not
    /// lose a payload.
    async fn recv(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Best-effort graceful close.
    async fn close(&mut self) -> Result<(), TransportError>;
}

// =============================================================================
// WebSocket Implementation
// =============================================================================

/// Dialer for `ws://` and `wss://` endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketDialer;

impl WebSocketDialer {
    /// Create a new WebSocket dialer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FeedDialer for WebSocketDialer {
    type Connection = WebSocketConnection;

    async fn dial(&self, url: &str) -> Result<Self::Connection, TransportError> {
        let (stream, response) =
            tokio_tungstenite::connect_async_with_config(url, Some(websocket_config()), false)
                .await?;
        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        Ok(WebSocketConnection { stream })
    }
}

/// Read limits applied to every feed connection.
fn websocket_config() -> WebSocketConfig {
    WebSocketConfig::default()
        .max_message_size(Some(MAX_MESSAGE_SIZE))
        .max_frame_size(Some(MAX_MESSAGE_SIZE))
}

/// Established WebSocket connection.
pub struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl std::fmt::Debug for WebSocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnection").finish_non_exhaustive()
    }
}

#[async_trait]
impl FeedConnection for WebSocketConnection {
    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_bytes().to_vec()),
                Some(Ok(Message::Binary(data))) => return Ok(data.to_vec()),
                Some(Ok(Message::Ping(data))) => {
                    self.stream.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map_or_else(
                        || "server sent close frame".to_string(),
                        |f| format!("server sent close frame ({}): {}", f.code, f.reason),
                    );
                    return Err(TransportError::Closed(reason));
                }
                Some(Ok(_)) => {
                    // Pong and raw frames carry no data
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(TransportError::Closed("stream ended".to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            }))
            .await?;
        Ok(())
    }
}
