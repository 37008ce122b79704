//! Monetary normalization.
//!
//! Prices travel as `f64` on the wire and in storage, but every rounding step goes
//! through `Decimal` so that `2.345` rounds to `2.35` and not to the `2.34` a naive
//! `(x * 100.0).round() / 100.0` produces.

use std::str::FromStr;

use rust_decimal::prelude::*;
use thiserror::Error;

const DECIMAL_PLACES: u32 = 2;

#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("amount must be a finite number, got {0}")]
    NotFinite(f64),

    #[error("amount {0} is out of the supported range")]
    OutOfRange(f64),
}

/// Converts via the shortest decimal representation of `value`, not its binary expansion.
pub fn to_decimal(value: f64) -> Result<Decimal, MoneyError> {
    if !value.is_finite() {
        return Err(MoneyError::NotFinite(value));
    }

    Decimal::from_str(&value.to_string()).map_err(|_| MoneyError::OutOfRange(value))
}

#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// `round(value * 100) / 100`, ties away from zero.
pub fn round_to_cents(value: f64) -> Result<f64, MoneyError> {
    to_decimal(value).map(to_f64)
}

pub fn line_amount(unit_price: f64, quantity: i64) -> Result<Decimal, MoneyError> {
    let unit_price = to_decimal(unit_price)?;

    unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or(MoneyError::OutOfRange(unit_price.to_f64().unwrap_or_default()))
}
