//! Stored Row Encoding
//!
//! Both sinks write the same row shape. Prices are stored with every digit
//! they carry; volumes are padded to at least eight fractional digits.

use crate::application::ports::SinkError;
use crate::domain::numeric::{VOLUME_MIN_SCALE, format_full, format_min_scale, parse_stored};
use crate::domain::{Tick, TickParts};

/// A tick in storage form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTick {
    /// Event type.
    pub event_kind: String,
    /// Event time (ms).
    pub event_time: i64,
    /// Symbol.
    pub symbol: String,
    /// Price text.
    pub last_price: String,
    /// Volume text.
    pub volume: String,
    /// Window open time (ms).
    pub open_time: i64,
    /// Window close time (ms).
    pub close_time: i64,
    /// Trade count.
    pub trade_count: i64,
}

impl From<&Tick> for StoredTick {
    fn from(tick: &Tick) -> Self {
        Self {
            event_kind: tick.event_kind().to_string(),
            event_time: tick.event_time(),
            symbol: tick.symbol().to_string(),
            last_price: format_full(tick.last_price()),
            volume: format_min_scale(tick.volume(), VOLUME_MIN_SCALE),
            open_time: tick.open_time(),
            close_time: tick.close_time(),
            trade_count: tick.trade_count(),
        }
    }
}

impl TryFrom<StoredTick> for Tick {
    type Error = SinkError;

    fn try_from(row: StoredTick) -> Result<Self, Self::Error> {
        let last_price = parse_stored(&row.last_price)
            .map_err(|e| SinkError::Corrupt(format!("last_price: {e}")))?;
        let volume =
            parse_stored(&row.volume).map_err(|e| SinkError::Corrupt(format!("volume: {e}")))?;

        <Self as TryFrom<TickParts>>::try_from(TickParts {
            event_kind: row.event_kind,
            event_time: row.event_time,
            symbol: row.symbol,
            last_price,
            volume,
            open_time: row.open_time,
            close_time: row.close_time,
            trade_count: row.trade_count,
        })
        .map_err(|e| SinkError::Corrupt(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn tick(price: &str, volume: &str) -> Tick {
        Tick::try_from(TickParts {
            event_kind: "24hrTicker".to_string(),
            event_time: 1_672_515_782_239,
            symbol: "BTCUSDT".to_string(),
            last_price: BigDecimal::from_str(price).unwrap(),
            volume: BigDecimal::from_str(volume).unwrap(),
            open_time: 1_672_429_382_239,
            close_time: 1_672_515_782_239,
            trade_count: 1_603_775,
        })
        .unwrap()
    }

    #[test]
    fn price_full_precision_volume_padded() {
        let row = StoredTick::from(&tick("16730.06000000", "202438.852"));
        assert_eq!(row.last_price, "16730.06000000");
        assert_eq!(row.volume, "202438.85200000");
    }

    #[test]
    fn long_volume_is_not_truncated() {
        let row = StoredTick::from(&tick("1", "0.0000000001"));
        assert_eq!(row.volume, "0.0000000001");
    }

    #[test]
    fn decodes_back_to_equal_values() {
        let original = tick("0.00001234", "5");
        let restored = Tick::try_from(StoredTick::from(&original)).unwrap();
        assert_eq!(restored.last_price(), original.last_price());
        assert_eq!(restored.volume(), original.volume());
        assert_eq!(restored.symbol(), original.symbol());
    }

    #[test]
    fn eighty_digit_price_stored_exactly() {
        let price = format!("{}.{}", "1".repeat(40), "2".repeat(38));
        let row = StoredTick::from(&tick(&price, "1"));
        assert_eq!(row.last_price, price);
        assert_eq!(row.volume, "1.00000000");
    }

    #[test]
    fn corrupt_price_text() {
        let mut row = StoredTick::from(&tick("1", "1"));
        row.last_price = "one".to_string();
        assert!(matches!(Tick::try_from(row), Err(SinkError::Corrupt(_))));
    }
}
