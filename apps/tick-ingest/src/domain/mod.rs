//! Domain Layer - Core tick types and numeric policy.
//!
//! Everything here is pure: no I/O, no async, no knowledge of the feed
//! transport or the storage engine.

/// Precision-preserving decimal parsing and storage formatting.
pub mod numeric;

/// The normalized market update.
pub mod tick;

pub use numeric::{NumericError, format_full, parse_decimal};
pub use tick::{MOCK_EVENT_KIND, Tick, TickError, TickParts};
