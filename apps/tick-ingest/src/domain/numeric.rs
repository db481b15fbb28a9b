//! Precision-Preserving Decimal Parsing
//!
//! Exchange feeds send prices and quantities as decimal strings so that no
//! binary floating-point rounding happens on the way in. This module turns
//! those strings into [`BigDecimal`] values and back into storage text.
//!
//! # Parsing Policy
//!
//! | Input              | Result                          |
//! |--------------------|---------------------------------|
//! | `""`               | `0`                             |
//! | `"16730.06000"`    | exact value, scale preserved    |
//! | `"1.5e3"`          | `1500`                          |
//! | `"abc"`, `"1.2.3"` | [`NumericError::Malformed`]     |
//! | `"-1.5"`           | [`NumericError::Negative`]      |
//!
//! Values keep up to [`SIGNIFICANT_DIGITS`] significant digits, which is at
//! least 256 bits of significance. Longer inputs are truncated toward zero,
//! never rounded. A value whose leading digit sits further than
//! [`MAX_EXPONENT`] places from the decimal point is
//! [`NumericError::Overflow`].

use std::str::FromStr;

use bigdecimal::num_bigint::{BigInt, Sign};
use bigdecimal::{BigDecimal, Zero};

/// Significant decimal digits kept from wire input (78 digits ≥ 256 bits).
pub const SIGNIFICANT_DIGITS: usize = 78;

/// Largest accepted decimal exponent of a value's leading digit.
pub const MAX_EXPONENT: i64 = 1024;

/// Minimum number of fractional digits written for stored volumes.
pub const VOLUME_MIN_SCALE: i64 = 8;

/// Errors produced while parsing a wire decimal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NumericError {
    /// Field was JSON `null`.
    #[error("numeric field is null")]
    Null,

    /// Input is not a plain or scientific decimal number.
    #[error("not a decimal number: {0:?}")]
    Malformed(String),

    /// Input is a negative number.
    #[error("negative value not allowed: {0}")]
    Negative(String),

    /// Exponent is outside the accepted range.
    #[error("value out of range: {0}")]
    Overflow(String),
}

/// Parse a wire decimal string.
///
/// # Errors
///
/// Returns [`NumericError`] when the input is not a non-negative decimal
/// number or its magnitude is out of range.
pub fn parse_decimal(raw: &str) -> Result<BigDecimal, NumericError> {
    if raw.is_empty() {
        return Ok(BigDecimal::zero());
    }

    let malformed = || NumericError::Malformed(raw.to_string());
    let overflow = || NumericError::Overflow(raw.to_string());

    let (negative, unsigned) = match raw.as_bytes()[0] {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };

    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, parse_exponent(raw, exponent)?),
        None => (unsigned, 0),
    };

    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty())
        || !all_digits(int_part)
        || !all_digits(frac_part)
    {
        return Err(malformed());
    }

    let scale = i64::try_from(frac_part.len())
        .ok()
        .and_then(|len| len.checked_sub(exponent))
        .ok_or_else(overflow)?;

    let digits = format!("{int_part}{frac_part}");
    let significant = digits.trim_start_matches('0');

    // "-0.00" parses as zero; store it without the sign.
    if significant.is_empty() {
        return Ok(BigDecimal::new(BigInt::zero(), scale.clamp(0, MAX_EXPONENT)));
    }
    if negative {
        return Err(NumericError::Negative(raw.to_string()));
    }

    let (kept, scale) = if significant.len() > SIGNIFICANT_DIGITS {
        let dropped = significant.len() - SIGNIFICANT_DIGITS;
        tracing::trace!(input = raw, dropped_digits = dropped, "Decimal input truncated");
        let scale = i64::try_from(dropped)
            .ok()
            .and_then(|dropped| scale.checked_sub(dropped))
            .ok_or_else(overflow)?;
        (&significant[..SIGNIFICANT_DIGITS], scale)
    } else {
        (significant, scale)
    };

    #[allow(clippy::cast_possible_wrap)]
    let leading = (kept.len() as i64 - 1)
        .checked_sub(scale)
        .ok_or_else(overflow)?;
    if leading.abs() > MAX_EXPONENT {
        return Err(overflow());
    }

    let mantissa = BigInt::parse_bytes(kept.as_bytes(), 10).ok_or_else(malformed)?;
    Ok(BigDecimal::new(mantissa, scale))
}

/// Parse an optional wire decimal, where `None` is JSON `null`.
///
/// # Errors
///
/// Returns [`NumericError::Null`] for `None`, otherwise as [`parse_decimal`].
pub fn parse_wire_decimal(raw: Option<&str>) -> Result<BigDecimal, NumericError> {
    raw.map_or(Err(NumericError::Null), parse_decimal)
}

fn parse_exponent(raw: &str, exponent: &str) -> Result<i64, NumericError> {
    let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NumericError::Malformed(raw.to_string()));
    }
    exponent
        .strip_prefix('+')
        .unwrap_or(exponent)
        .parse::<i64>()
        .map_err(|_| NumericError::Overflow(raw.to_string()))
}

/// Storage text for a price: every digit the value carries, in plain
/// positional notation.
#[must_use]
pub fn format_full(value: &BigDecimal) -> String {
    let (mantissa, scale) = value.as_bigint_and_exponent();
    let sign = if mantissa.sign() == Sign::Minus { "-" } else { "" };
    let digits = mantissa.magnitude().to_string();

    #[allow(clippy::cast_possible_truncation)]
    let places = scale.unsigned_abs() as usize;

    if scale <= 0 {
        if mantissa.is_zero() {
            return "0".to_string();
        }
        return format!("{sign}{digits}{}", "0".repeat(places));
    }

    if digits.len() > places {
        let (whole, fraction) = digits.split_at(digits.len() - places);
        format!("{sign}{whole}.{fraction}")
    } else {
        format!("{sign}0.{}{digits}", "0".repeat(places - digits.len()))
    }
}

/// Storage text for a volume: at least `min_scale` fractional digits, more
/// when the value carries them.
#[must_use]
pub fn format_min_scale(value: &BigDecimal, min_scale: i64) -> String {
    let (_, scale) = value.as_bigint_and_exponent();
    if scale < min_scale {
        format_full(&value.with_scale(min_scale))
    } else {
        format_full(value)
    }
}

/// Parse storage text written by [`format_full`] or [`format_min_scale`].
///
/// # Errors
///
/// Returns [`NumericError::Malformed`] if the text is not a decimal.
pub fn parse_stored(text: &str) -> Result<BigDecimal, NumericError> {
    BigDecimal::from_str(text).map_err(|_| NumericError::Malformed(text.to_string()))
}
