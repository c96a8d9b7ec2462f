//! Money helpers.
//!
//! Amounts are plain `rust_decimal::Decimal` values kept at two decimal places.
//! Everything read from storage or received from a caller goes through
//! [`normalize`] before it takes part in a computation.

use crate::errors::{Error, Result};
use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places money is kept at.
pub const MONEY_SCALE: u32 = 2;

/// Rounds to cents, midpoint away from zero.
#[must_use]
pub fn normalize(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Accepts strictly positive amounts only (payments, transfers).
pub fn ensure_positive(amount: Decimal) -> Result<Decimal> {
    let amount = normalize(amount);
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(amount)
}

/// Accepts zero or positive amounts (catalog prices, fixed assistance amounts).
pub fn ensure_non_negative(amount: Decimal) -> Result<Decimal> {
    let amount = normalize(amount);
    if amount < Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(amount)
}

/// `max(0, amount)`
#[must_use]
pub fn floor_zero(amount: Decimal) -> Decimal {
    amount.max(Decimal::ZERO)
}
