//! Fixed-point money value object.
//!
//! Prices and totals are `rust_decimal` values, never floats; display is
//! normalized to two decimal places.

use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// An amount of money in the store's single currency.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build from major/minor units, e.g. `Money::from_parts(19, 99)` for 19.99.
    pub fn from_parts(units: i64, cents: u32) -> Self {
        debug_assert!(cents < 100);
        Self(Decimal::new(units * 100 + i64::from(cents), 2))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl ValueObject for Money {}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Mul<u32> for Money {
    type Output = Money;

    fn mul(self, rhs: u32) -> Money {
        Money(self.0 * Decimal::from(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_builds_exact_decimals() {
        assert_eq!(Money::from_parts(19, 99).to_string(), "19.99");
        assert_eq!(Money::from_parts(5, 0).to_string(), "5.00");
    }

    #[test]
    fn line_total_arithmetic() {
        let total = Money::from_parts(10, 0) * 2 + Money::from_parts(5, 0) * 1;
        assert_eq!(total, Money::from_parts(25, 0));
        assert_eq!(total.to_string(), "25.00");
    }

    #[test]
    fn summing_an_empty_iterator_is_zero() {
        let total: Money = core::iter::empty().sum();
        assert_eq!(total, Money::ZERO);
    }
}
