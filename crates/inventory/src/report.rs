//! Read-only reports derived from products, suppliers, and ledger entries.
//!
//! Everything here is a pure function of its inputs. Inactive products and
//! suppliers are filtered explicitly.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Money, ProductId};

use crate::product::Product;
use crate::supplier::Supplier;
use crate::transaction::{Direction, StockTransaction};

/// Active products at or below their minimum stock level (includes out-of-stock).
pub fn low_stock_products(products: &[Product]) -> Vec<&Product> {
    products
        .iter()
        .filter(|p| p.is_active() && p.is_low_stock())
        .collect()
}

/// Active products with nothing on hand.
pub fn out_of_stock_products(products: &[Product]) -> Vec<&Product> {
    products
        .iter()
        .filter(|p| p.is_active() && p.is_out_of_stock())
        .collect()
}

/// Aggregate counts and valuation across active products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total_products: usize,
    pub total_suppliers: usize,
    pub low_stock_count: usize,
    pub out_of_stock_count: usize,
    pub total_value: Money,
}

pub fn inventory_summary(products: &[Product], suppliers: &[Supplier]) -> InventorySummary {
    let active: Vec<&Product> = products.iter().filter(|p| p.is_active()).collect();
    InventorySummary {
        total_products: active.len(),
        total_suppliers: suppliers.iter().filter(|s| s.is_active).count(),
        low_stock_count: active.iter().filter(|p| p.is_low_stock()).count(),
        out_of_stock_count: active.iter().filter(|p| p.is_out_of_stock()).count(),
        total_value: active.iter().map(|p| p.total_value()).sum(),
    }
}

/// Stock-in / stock-out totals over a set of ledger entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementStats {
    pub stock_in_count: usize,
    pub stock_out_count: usize,
    pub stock_in_quantity: i64,
    pub stock_out_quantity: i64,
    pub total_transactions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopProduct {
    pub product_id: ProductId,
    pub name: String,
    /// Sum of magnitudes in both directions.
    pub total_quantity: i64,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: String,
    pub product_count: usize,
    pub total_value: Money,
}

/// Movement report for a closed time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub stats: MovementStats,
    pub top_products: Vec<TopProduct>,
    pub categories: Vec<CategoryStats>,
}

/// Build a movement report over entries with `from <= created_at <= to`.
///
/// `top_products` is ordered by moved quantity (descending), ties by name, and
/// capped at `top_n`. `categories` covers active products, sorted by name.
/// Quantity totals saturate at `i64::MAX`.
pub fn movement_report(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    transactions: &[StockTransaction],
    products: &[Product],
    top_n: usize,
) -> MovementReport {
    let in_range: Vec<&StockTransaction> = transactions
        .iter()
        .filter(|t| t.created_at >= from && t.created_at <= to)
        .collect();

    let mut stats = MovementStats {
        total_transactions: in_range.len(),
        ..MovementStats::default()
    };
    let mut volume: HashMap<ProductId, (i64, usize)> = HashMap::new();
    for t in &in_range {
        match t.direction {
            Direction::Add => {
                stats.stock_in_count += 1;
                stats.stock_in_quantity = stats.stock_in_quantity.saturating_add(t.magnitude);
            }
            Direction::Remove => {
                stats.stock_out_count += 1;
                stats.stock_out_quantity = stats.stock_out_quantity.saturating_add(t.magnitude);
            }
        }
        let entry = volume.entry(t.product_id).or_default();
        entry.0 = entry.0.saturating_add(t.magnitude);
        entry.1 += 1;
    }

    let names: HashMap<ProductId, &str> =
        products.iter().map(|p| (p.id_typed(), p.name())).collect();
    let mut top_products: Vec<TopProduct> = volume
        .into_iter()
        .map(|(product_id, (total_quantity, transaction_count))| TopProduct {
            product_id,
            name: names.get(&product_id).copied().unwrap_or_default().to_string(),
            total_quantity,
            transaction_count,
        })
        .collect();
    top_products.sort_by(|a, b| {
        b.total_quantity
            .cmp(&a.total_quantity)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    top_products.truncate(top_n);

    let mut by_category: BTreeMap<&str, (usize, Money)> = BTreeMap::new();
    for p in products.iter().filter(|p| p.is_active()) {
        let entry = by_category.entry(p.category()).or_insert((0, Money::ZERO));
        entry.0 += 1;
        entry.1 = entry.1.saturating_add(p.total_value());
    }
    let categories = by_category
        .into_iter()
        .map(|(category, (product_count, total_value))| CategoryStats {
            category: category.to_string(),
            product_count,
            total_value,
        })
        .collect();

    MovementReport {
        from,
        to,
        stats,
        top_products,
        categories,
    }
}
