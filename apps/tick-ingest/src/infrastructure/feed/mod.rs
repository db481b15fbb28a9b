//! Ticker Feed Adapters
//!
//! Implements the tick stream port:
//!
//! - **Live**: exchange ticker WebSocket with supervised reconnection
//! - **Mock**: synthetic generator for offline runs

pub mod codec;
pub mod messages;
pub mod mock;
pub mod reconnect;
pub mod supervisor;
pub mod transport;

pub use codec::{DecodeError, TickerCodec};
pub use messages::TickerMessage;
pub use mock::{DEFAULT_BASE_PRICE, DEFAULT_MOCK_INTERVAL, MockStreamer};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use supervisor::{ConnectionSupervisor, DEFAULT_FEED_HOST, SupervisorConfig};
pub use transport::{
    FeedConnection, FeedDialer, TransportError, WebSocketConnection, WebSocketDialer,
};
