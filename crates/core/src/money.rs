use serde::{Deserialize, Serialize};

/// Non-negative amount of money in the smallest currency unit (e.g. cents).
///
/// Prices are stored as integers so that valuation sums are exact.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor_units: u64) -> Self {
        Self(minor_units)
    }

    pub fn minor_units(self) -> u64 {
        self.0
    }

    /// Value of `quantity` units at this price. Non-positive quantities are worth nothing.
    pub fn times(self, quantity: i64) -> Money {
        if quantity <= 0 {
            return Money::ZERO;
        }
        Money(self.0.saturating_mul(quantity as u64))
    }

    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Money::saturating_add)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}
