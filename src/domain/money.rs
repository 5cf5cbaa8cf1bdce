//! Monetary amount type backed by rust_decimal.
//!
//! All platform money math rounds to 2 decimal places at each computation
//! step, never carrying unrounded intermediates forward.

use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Monetary amount for ledger, settlement, and payout calculations.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes to JSON number (not string) by default.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Money {
    /// Create a Money from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Money(value)
    }

    /// Parse a Money from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Money)
    }

    /// Format as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Money(RustDecimal::ZERO)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Round to 2 decimal places, midpoint away from zero.
    ///
    /// Applied after every fee/earning computation step.
    pub fn round2(&self) -> Self {
        Money(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// `pct` percent of `self`, rounded to 2 decimals.
    pub fn percent(&self, pct: Money) -> Self {
        Money(self.0 * pct.0 / RustDecimal::ONE_HUNDRED).round2()
    }

    /// `max(0, self)`, used wherever the model floors at zero.
    pub fn floor_zero(&self) -> Self {
        if self.is_negative() {
            Money::zero()
        } else {
            *self
        }
    }

    /// Construct from an integer amount (whole currency units).
    pub fn from_i64(value: i64) -> Self {
        Money(RustDecimal::from(value))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Money {
    fn from(value: RustDecimal) -> Self {
        Money(value)
    }
}

impl From<Money> for RustDecimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Money {
    type Output = Money;

    fn mul(self, rhs: Money) -> Money {
        Money(self.0 * rhs.0)
    }
}

impl std::ops::Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}
