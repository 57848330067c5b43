use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, Money, ProductId, TransactionId, UserId};

/// Whether a transaction increases or decreases stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Add,
    Remove,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Add => "add",
            Direction::Remove => "remove",
        }
    }

    /// Sign applied to a magnitude moving in this direction.
    pub fn sign(self) -> i64 {
        match self {
            Direction::Add => 1,
            Direction::Remove => -1,
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Direction::Add),
            "remove" => Ok(Direction::Remove),
            other => Err(DomainError::validation(format!(
                "direction must be 'add' or 'remove', got '{other}'"
            ))),
        }
    }
}

/// Immutable ledger entry recording one stock movement of one product.
///
/// Created exactly once by `Product::handle` and never modified afterwards.
/// `quantity_after` is always `quantity_before ± magnitude` and never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: TransactionId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub direction: Direction,
    pub magnitude: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    /// Product price at the moment of the movement.
    pub unit_price: Option<Money>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockTransaction {
    /// Quantity change contributed by this entry.
    pub fn signed_delta(&self) -> i64 {
        self.direction.sign() * self.magnitude
    }

    /// Magnitude valued at the price snapshot (zero without a snapshot).
    pub fn total_value(&self) -> Money {
        self.unit_price
            .map(|price| price.times(self.magnitude))
            .unwrap_or(Money::ZERO)
    }

    /// Checks the before/after arithmetic of the entry.
    pub fn is_consistent(&self) -> bool {
        self.magnitude > 0
            && self.quantity_after >= 0
            && self.quantity_before + self.signed_delta() == self.quantity_after
    }
}
