//! Tick Domain Type
//!
//! A [`Tick`] is one normalized market update for a single instrument. It is
//! built once from a decoded feed message, validated, and never mutated
//! afterwards: fields are private and only exposed through accessors.

use bigdecimal::{BigDecimal, Zero};

/// Event kind tag used by the synthetic feed generator.
pub const MOCK_EVENT_KIND: &str = "mock";

/// Reasons a set of fields cannot form a [`Tick`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickError {
    /// Symbol was empty.
    #[error("symbol must not be empty")]
    EmptySymbol,

    /// A decimal field was negative.
    #[error("{field} must not be negative, got {value}")]
    Negative {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: BigDecimal,
    },
}

/// Unvalidated tick fields, converted with `Tick::try_from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickParts {
    /// Update type reported by the feed (e.g. `24hrTicker`).
    pub event_kind: String,
    /// Feed-reported event time, epoch milliseconds.
    pub event_time: i64,
    /// Instrument identifier.
    pub symbol: String,
    /// Last traded price.
    pub last_price: BigDecimal,
    /// Traded volume in the reporting window.
    pub volume: BigDecimal,
    /// Window open time, epoch milliseconds.
    pub open_time: i64,
    /// Window close time, epoch milliseconds.
    pub close_time: i64,
    /// Number of trades in the window.
    pub trade_count: i64,
}

/// One normalized, immutable market update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    event_kind: String,
    event_time: i64,
    symbol: String,
    last_price: BigDecimal,
    volume: BigDecimal,
    open_time: i64,
    close_time: i64,
    trade_count: i64,
}

impl TryFrom<TickParts> for Tick {
    type Error = TickError;

    fn try_from(parts: TickParts) -> Result<Self, Self::Error> {
        if parts.symbol.is_empty() {
            return Err(TickError::EmptySymbol);
        }
        if parts.last_price < BigDecimal::zero() {
            return Err(TickError::Negative {
                field: "last_price",
                value: parts.last_price,
            });
        }
        if parts.volume < BigDecimal::zero() {
            return Err(TickError::Negative {
                field: "volume",
                value: parts.volume,
            });
        }

        Ok(Self {
            event_kind: parts.event_kind,
            event_time: parts.event_time,
            symbol: parts.symbol,
            last_price: parts.last_price,
            volume: parts.volume,
            open_time: parts.open_time,
            close_time: parts.close_time,
            trade_count: parts.trade_count,
        })
    }
}

impl Tick {
    /// Update type reported by the feed.
    #[must_use]
    pub fn event_kind(&self) -> &str {
        &self.event_kind
    }

    /// Feed-reported event time, epoch milliseconds.
    #[must_use]
    pub const fn event_time(&self) -> i64 {
        self.event_time
    }

    /// Instrument identifier.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Last traded price.
    #[must_use]
    pub const fn last_price(&self) -> &BigDecimal {
        &self.last_price
    }

    /// Traded volume.
    #[must_use]
    pub const fn volume(&self) -> &BigDecimal {
        &self.volume
    }

    /// Window open time, epoch milliseconds.
    #[must_use]
    pub const fn open_time(&self) -> i64 {
        self.open_time
    }

    /// Window close time, epoch milliseconds.
    #[must_use]
    pub const fn close_time(&self) -> i64 {
        self.close_time
    }

    /// Number of trades in the window.
    #[must_use]
    pub const fn trade_count(&self) -> i64 {
        self.trade_count
    }

    /// Whether this tick came from the synthetic generator.
    #[must_use]
    pub fn is_mock(&self) -> bool {
        self.event_kind == MOCK_EVENT_KIND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::numeric::format_full;
    use std::str::FromStr;

    fn parts() -> TickParts {
        TickParts {
            event_kind: "24hrTicker".to_string(),
            event_time: 1_672_515_782_239,
            symbol: "BTCUSDT".to_string(),
            last_price: BigDecimal::from_str("16730.06000000").unwrap(),
            volume: BigDecimal::from_str("202438.852").unwrap(),
            open_time: 1_672_429_382_239,
            close_time: 1_672_515_782_239,
            trade_count: 1_603_775,
        }
    }

    #[test]
    fn valid_parts_build_tick() {
        let tick = Tick::try_from(parts()).unwrap();
        assert_eq!(tick.symbol(), "BTCUSDT");
        assert_eq!(tick.trade_count(), 1_603_775);
        assert_eq!(format_full(tick.last_price()), "16730.06000000");
        assert!(!tick.is_mock());
    }

    #[test]
    fn empty_symbol_rejected() {
        let mut p = parts();
        p.symbol.clear();
        assert_eq!(Tick::try_from(p), Err(TickError::EmptySymbol));
    }

    #[test]
    fn negative_volume_rejected() {
        let mut p = parts();
        p.volume = BigDecimal::from(-1);
        assert!(matches!(
            Tick::try_from(p),
            Err(TickError::Negative { field: "volume", .. })
        ));
    }

    #[test]
    fn zero_price_allowed() {
        let mut p = parts();
        p.last_price = BigDecimal::zero();
        assert!(Tick::try_from(p).is_ok());
    }
}
