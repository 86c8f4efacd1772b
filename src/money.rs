//! Amount Conversion Module
//!
//! Unified conversion between caller-facing major units (`Decimal`, e.g. rupees)
//! and the gateway wire representation in minor units (`i64`, e.g. paise).
//! All conversions MUST go through this module; no handler multiplies by hand.
//!
//! ## Wire Representation
//! - The gateway carries every amount as an `i64` count of minor units
//! - The scale factor is fixed at 100 (two decimal places)
//! - Sub-minor precision is rejected, never rounded

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

/// Minor units per major unit (paise per rupee, cents per dollar).
pub const MINOR_PER_MAJOR: i64 = 100;

/// Amount conversion errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount must be positive")]
    NotPositive,

    #[error("Amount {0} has more than 2 decimal places")]
    SubMinorPrecision(Decimal),

    #[error("Amount {0} too large, would overflow the wire format")]
    Overflow(Decimal),
}

/// Convert a caller-facing major amount to wire minor units.
///
/// Rejects zero and negative amounts, and any amount finer than one minor
/// unit. Silent rounding of a financial amount is never acceptable here.
pub fn to_minor(major: Decimal) -> Result<i64, MoneyError> {
    if major <= Decimal::ZERO {
        return Err(MoneyError::NotPositive);
    }

    let scaled = major
        .checked_mul(Decimal::from(MINOR_PER_MAJOR))
        .ok_or(MoneyError::Overflow(major))?;
    if scaled.fract() != Decimal::ZERO {
        return Err(MoneyError::SubMinorPrecision(major));
    }

    scaled.to_i64().ok_or(MoneyError::Overflow(major))
}

/// Convert a wire minor amount back to major units.
///
/// Every `i64` is exactly representable at scale 2, so this direction
/// cannot fail.
pub fn to_major(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}
