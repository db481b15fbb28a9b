//! Ticker Wire Format
//!
//! Deserialization type for the exchange's individual-symbol ticker stream.
//!
//! # Wire Format (JSON)
//! ```json
//! {
//!   "e": "24hrTicker",      // Event type
//!   "E": 1672515782239,     // Event time (ms)
//!   "s": "BTCUSDT",         // Symbol
//!   "c": "16730.06000000",  // Last price (string)
//!   "v": "202438.852",      // Total traded base asset volume (string)
//!   "O": 1672429382239,     // Statistics open time (ms)
//!   "C": 1672515782239,     // Statistics close time (ms)
//!   "n": 1603775            // Total number of trades
//! }
//! ```
//!
//! The payload carries many more fields (bid/ask, high/low, quote volume);
//! they are ignored.

use serde::{Deserialize, Deserializer};

/// Ticker message as sent on the wire.
///
/// Price and volume stay as raw strings here; the codec converts them so
/// that a failure names the field it came from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickerMessage {
    /// Event type
    #[serde(rename = "e")]
    pub event_kind: String,

    /// Event time (ms)
    #[serde(rename = "E")]
    pub event_time: i64,

    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,

    /// Last price; `None` when the wire value is `null`
    #[serde(rename = "c", deserialize_with = "nullable_string")]
    pub last_price: Option<String>,

    /// Volume; `None` when the wire value is `null`
    #[serde(rename = "v", deserialize_with = "nullable_string")]
    pub volume: Option<String>,

    /// Window open time (ms)
    #[serde(rename = "O")]
    pub open_time: i64,

    /// Window close time (ms)
    #[serde(rename = "C")]
    pub close_time: i64,

    /// Trade count
    #[serde(rename = "n")]
    pub trade_count: i64,
}

/// Accept a string or `null`, but not a missing field or a JSON number.
fn nullable_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}
