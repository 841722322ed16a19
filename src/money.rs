//! Money Conversion Module
//!
//! Conversion between the internal u64 smallest-unit representation and the
//! decimal strings clients send and receive. Every amount crossing the API
//! boundary goes through this module.
//!
//! ## Internal Representation
//! - Amounts are stored as `u64` in the smallest currency unit
//! - The scale factor is `10^currency_decimals` (2 decimals: 1.00 = 100)
//! - Corrections are the only signed values (`i64`)
//!
//! ## Usage
//! ```rust
//! use referral_tree::money::{format_amount, parse_amount};
//!
//! let internal = parse_amount("1000.50", 2).unwrap();
//! assert_eq!(internal, 100_050);
//! assert_eq!(format_amount(internal, 2), "1000.50");
//! ```

use rust_decimal::prelude::*;
use thiserror::Error;

use crate::error::EngineError;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl From<MoneyError> for EngineError {
    fn from(e: MoneyError) -> Self {
        EngineError::InvalidAmount(e.to_string())
    }
}

// ============================================================================
// Parse: Client → Internal
// ============================================================================

/// Convert a client amount string to smallest units.
///
/// Strict: no sign, no exponent, no grouping, no `.5` or `5.` forms and no
/// more fractional digits than `decimals`. Zero is rejected.
pub fn parse_amount(amount_str: &str, decimals: u32) -> Result<u64, MoneyError> {
    let amount = parse_unsigned(amount_str, decimals)?;
    if amount == 0 {
        return Err(MoneyError::InvalidAmount);
    }
    Ok(amount)
}

/// Like [`parse_amount`] but accepts a leading `-` and zero. Used for
/// corrections.
pub fn parse_signed_amount(amount_str: &str, decimals: u32) -> Result<i64, MoneyError> {
    let trimmed = amount_str.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let magnitude = parse_unsigned(digits, decimals)?;
    if negative {
        0i64.checked_sub_unsigned(magnitude).ok_or(MoneyError::Overflow)
    } else {
        i64::try_from(magnitude).map_err(|_| MoneyError::Overflow)
    }
}

fn parse_unsigned(amount_str: &str, decimals: u32) -> Result<u64, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }
    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let (whole, frac) = match amount_str.split_once('.') {
        None => (amount_str, ""),
        Some((whole, frac)) => {
            if whole.is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if frac.is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            if decimals == 0 {
                return Err(MoneyError::InvalidFormat(
                    "decimals is 0, but dot provided".into(),
                ));
            }
            (whole, frac)
        }
    };

    if !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in whole part: {}",
            whole
        )));
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in fractional part: {}",
            frac
        )));
    }

    // No silent truncation
    if frac.len() > decimals as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: decimals,
        });
    }

    let whole_num: u64 = whole.parse().map_err(|_| MoneyError::Overflow)?;
    let frac_num: u64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<width$}", frac, width = decimals as usize)
            .parse()
            .map_err(|_| MoneyError::Overflow)?
    };

    let multiplier = 10u64.checked_pow(decimals).ok_or(MoneyError::Overflow)?;
    whole_num
        .checked_mul(multiplier)
        .and_then(|v| v.checked_add(frac_num))
        .ok_or(MoneyError::Overflow)
}

// ============================================================================
// Format: Internal → Client
// ============================================================================

/// Format smallest units with exactly `decimals` fractional digits.
pub fn format_amount(value: u64, decimals: u32) -> String {
    let decimal_value = Decimal::from(value) / Decimal::from(10u64.pow(decimals));
    format!("{:.prec$}", decimal_value, prec = decimals as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_variations() {
        assert_eq!(parse_amount("1000", 2).unwrap(), 100_000);
        assert_eq!(parse_amount("1.23", 2).unwrap(), 123);
        assert_eq!(parse_amount("001.2", 2).unwrap(), 120);
        assert_eq!(parse_amount("0.01", 2).unwrap(), 1);
        assert_eq!(parse_amount(" 7 ", 0).unwrap(), 7);

        assert_eq!(parse_amount("0", 2), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("0.00", 2), Err(MoneyError::InvalidAmount));
    }

    #[test]
    fn test_parse_amount_invalid_formats() {
        for case in [
            "", "1,000.00", "1.2.3", "1. 23", "+1.23", "-1", "1e2", "0x12", ".", ".5", "5.",
        ] {
            assert!(parse_amount(case, 2).is_err(), "accepted {:?}", case);
        }
        assert!(parse_amount("100.0", 0).is_err());
    }

    #[test]
    fn test_parse_amount_precision_and_overflow() {
        assert_eq!(
            parse_amount("1.234", 2),
            Err(MoneyError::PrecisionOverflow {
                provided: 3,
                max: 2
            })
        );
        assert_eq!(
            parse_amount("184467440737095516.15", 2).unwrap(),
            u64::MAX
        );
        assert_eq!(
            parse_amount("184467440737095516.16", 2),
            Err(MoneyError::Overflow)
        );
        assert_eq!(
            parse_amount("999999999999999999999", 0),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_parse_signed_amount() {
        assert_eq!(parse_signed_amount("-12.50", 2).unwrap(), -1250);
        assert_eq!(parse_signed_amount("3", 2).unwrap(), 300);
        assert_eq!(parse_signed_amount("0", 2).unwrap(), 0);
        assert!(parse_signed_amount("--1", 2).is_err());
        assert!(parse_signed_amount("+1", 2).is_err());
        assert_eq!(
            parse_signed_amount("-9223372036854775808", 0).unwrap(),
            i64::MIN
        );
        assert_eq!(
            parse_signed_amount("9223372036854775808", 0),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(100_050, 2), "1000.50");
        assert_eq!(format_amount(5, 2), "0.05");
        assert_eq!(format_amount(42, 0), "42");
        assert_eq!(format_amount(u64::MAX, 2), "184467440737095516.15");
    }

    #[test]
    fn test_money_error_maps_to_invalid_amount() {
        let e: EngineError = MoneyError::Overflow.into();
        assert!(matches!(e, EngineError::InvalidAmount(_)));
    }
}
