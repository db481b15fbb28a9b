//! Ticker Codec
//!
//! Turns one raw WebSocket payload into a validated [`Tick`]. Pure: no I/O
//! and no shared state, so a failure affects only the message at hand.

use crate::domain::numeric::{NumericError, parse_wire_decimal};
use crate::domain::{Tick, TickError, TickParts};

use super::messages::TickerMessage;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Payload is not a ticker JSON object.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// A decimal field could not be parsed.
    #[error("invalid {field}: {source}")]
    Field {
        /// Tick attribute name.
        field: &'static str,
        /// Parse failure.
        #[source]
        source: NumericError,
    },

    /// Fields parsed but do not form a valid tick.
    #[error("invalid tick: {0}")]
    Tick(#[from] TickError),
}

/// JSON codec for the individual-symbol ticker stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickerCodec;

impl TickerCodec {
    /// Create a new ticker codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a raw payload into a tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a ticker object, a decimal
    /// field is `null` or malformed, or the symbol is empty.
    pub fn decode(&self, payload: &[u8]) -> Result<Tick, DecodeError> {
        let message: TickerMessage = serde_json::from_slice(payload)?;
        Self::into_tick(message)
    }

    fn into_tick(message: TickerMessage) -> Result<Tick, DecodeError> {
        let last_price =
            parse_wire_decimal(message.last_price.as_deref()).map_err(|source| {
                DecodeError::Field {
                    field: "last_price",
                    source,
                }
            })?;
        let volume = parse_wire_decimal(message.volume.as_deref()).map_err(|source| {
            DecodeError::Field {
                field: "volume",
                source,
            }
        })?;

        let tick = Tick::try_from(TickParts {
            event_kind: message.event_kind,
            event_time: message.event_time,
            symbol: message.symbol,
            last_price,
            volume,
            open_time: message.open_time,
            close_time: message.close_time,
            trade_count: message.trade_count,
        })?;

        Ok(tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::numeric::format_full;
    use bigdecimal::{BigDecimal, Zero};
    use std::str::FromStr;

    const BTC_TICKER: &str = r#"{"e":"24hrTicker","E":1672515782239,"s":"BTCUSDT","c":"16730.06000000","v":"202438.852","O":1672429382239,"C":1672515782239,"n":1603775}"#;

    fn with_price(price: &str) -> String {
        format!(
            r#"{{"e":"24hrTicker","E":1,"s":"BTCUSDT","c":{price},"v":"1.0","O":0,"C":1,"n":1}}"#
        )
    }

    #[test]
    fn decodes_btcusdt_ticker() {
        let tick = TickerCodec::new().decode(BTC_TICKER.as_bytes()).unwrap();

        assert_eq!(tick.event_kind(), "24hrTicker");
        assert_eq!(tick.event_time(), 1_672_515_782_239);
        assert_eq!(tick.symbol(), "BTCUSDT");
        assert_eq!(
            tick.last_price(),
            &BigDecimal::from_str("16730.06").unwrap()
        );
        assert_eq!(format_full(tick.last_price()), "16730.06000000");
        assert_eq!(
            tick.volume(),
            &BigDecimal::from_str("202438.852").unwrap()
        );
        assert_eq!(tick.open_time(), 1_672_429_382_239);
        assert_eq!(tick.close_time(), 1_672_515_782_239);
        assert_eq!(tick.trade_count(), 1_603_775);
    }

    #[test]
    fn empty_price_is_zero() {
        let tick = TickerCodec::new()
            .decode(with_price(r#""""#).as_bytes())
            .unwrap();
        assert!(tick.last_price().is_zero());
    }

    #[test]
    fn null_price_is_error() {
        let err = TickerCodec::new()
            .decode(with_price("null").as_bytes())
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Field {
                field: "last_price",
                source: NumericError::Null
            }
        ));
    }

    #[test]
    fn non_numeric_price_is_error() {
        let err = TickerCodec::new()
            .decode(with_price(r#""not-a-number""#).as_bytes())
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Field {
                field: "last_price",
                source: NumericError::Malformed(_)
            }
        ));
    }

    #[test]
    fn empty_symbol_is_error() {
        let json = r#"{"e":"24hrTicker","E":1,"s":"","c":"1","v":"1","O":0,"C":1,"n":1}"#;
        let err = TickerCodec::new().decode(json.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::Tick(TickError::EmptySymbol)));
    }

    #[test]
    fn garbage_is_json_error() {
        let err = TickerCodec::new().decode(b"\x00\xffnot json").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn long_price_keeps_every_digit() {
        let tick = TickerCodec::new()
            .decode(with_price(r#""0.0000000123456789012345678""#).as_bytes())
            .unwrap();
        assert_eq!(
            format_full(tick.last_price()),
            "0.0000000123456789012345678"
        );
    }

    #[test]
    fn wide_integer_price_is_exact() {
        let tick = TickerCodec::new()
            .decode(with_price(r#""123456789012345678901234567890.5""#).as_bytes())
            .unwrap();
        assert_eq!(
            format_full(tick.last_price()),
            "123456789012345678901234567890.5"
        );
    }

    #[test]
    fn forty_digit_price_keeps_every_digit() {
        let tick = TickerCodec::new()
            .decode(with_price(r#""1.234567890123456789012345678901234567890""#).as_bytes())
            .unwrap();
        assert_eq!(
            format_full(tick.last_price()),
            "1.234567890123456789012345678901234567890"
        );
    }
}
