//! Read-only queries. None of these take the product locks or write anything.

use chrono::{DateTime, Utc};

use stockledger_core::{Money, ProductId};
use stockledger_inventory::{
    InventorySummary, MovementReport, Product, StockStatus, StockTransaction, inventory_summary,
    low_stock_products, movement_report, out_of_stock_products,
};

use super::{LedgerError, StockLedger};
use crate::store::LedgerStore;

impl<S> StockLedger<S>
where
    S: LedgerStore,
{
    pub async fn stock_status(&self, id: ProductId) -> Result<StockStatus, LedgerError> {
        Ok(self.product(id).await?.stock_status())
    }

    /// Current quantity valued at the current price.
    pub async fn total_value(&self, id: ProductId) -> Result<Money, LedgerError> {
        Ok(self.product(id).await?.total_value())
    }

    /// Ledger entries of a product, most recent first.
    ///
    /// `limit` defaults to `LedgerConfig::history_limit`. History stays readable
    /// after the product is deactivated.
    pub async fn history(
        &self,
        id: ProductId,
        limit: Option<usize>,
    ) -> Result<Vec<StockTransaction>, LedgerError> {
        // Distinguish "unknown product" from "no movements yet".
        self.product(id).await?;
        let limit = limit.unwrap_or(self.config.history_limit);
        Ok(self.store.history(id, Some(limit)).await?)
    }

    pub async fn recent_transactions(&self, limit: usize) -> Result<Vec<StockTransaction>, LedgerError> {
        Ok(self.store.recent_transactions(limit).await?)
    }

    pub async fn low_stock_products(&self) -> Result<Vec<Product>, LedgerError> {
        let products = self.store.list_products().await?;
        Ok(low_stock_products(&products).into_iter().cloned().collect())
    }

    pub async fn out_of_stock_products(&self) -> Result<Vec<Product>, LedgerError> {
        let products = self.store.list_products().await?;
        Ok(out_of_stock_products(&products).into_iter().cloned().collect())
    }

    pub async fn inventory_summary(&self) -> Result<InventorySummary, LedgerError> {
        let products = self.store.list_products().await?;
        let suppliers = self.store.list_suppliers().await?;
        Ok(inventory_summary(&products, &suppliers))
    }

    /// Movement report over `from <= created_at <= to`.
    pub async fn movement_report(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<MovementReport, LedgerError> {
        if from > to {
            return Err(LedgerError::Validation(format!(
                "report range starts after it ends ({from} > {to})"
            )));
        }
        let transactions = self.store.transactions_between(from, to).await?;
        let products = self.store.list_products().await?;
        Ok(movement_report(
            from,
            to,
            &transactions,
            &products,
            self.config.top_products,
        ))
    }
}
