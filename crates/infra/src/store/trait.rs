use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stockledger_core::{ExpectedVersion, ProductId, SupplierId, UserId};
use stockledger_inventory::{Product, StockTransaction, Supplier, User};

/// Storage operation error.
///
/// These are **infrastructure errors** (storage, concurrency, referential
/// integrity) as opposed to domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored product version did not match the expected one.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A uniqueness constraint was violated (id, SKU, username, active
    /// supplier name or email).
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A write referenced a row that does not exist (unknown product, user, supplier).
    #[error("missing reference: {0}")]
    MissingReference(String),

    /// The row is still referenced by active rows (a supplier with active
    /// products).
    #[error("still in use: {0}")]
    InUse(String),

    /// The write itself was malformed (e.g. a movement that does not match the product state).
    #[error("invalid write: {0}")]
    InvalidWrite(String),

    /// The backend could not durably record or read the data.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Persistence boundary of the stock ledger.
///
/// Products are versioned aggregates. Every product write goes through
/// [`LedgerStore::commit`], which is a compare-and-swap on the product version
/// combined with the append of at most one ledger entry.
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - make `commit` and `insert_product` all-or-nothing (product row and ledger
///   entry are both written or neither is)
/// - reject a `commit` whose `expected_version` does not match the stored version
///   with [`StoreError::Concurrency`], without writing anything
/// - never update or delete a stored ledger entry
/// - never let an active product take on an inactive supplier, nor deactivate
///   a supplier that active products still reference
/// - return history most recent first
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn load_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError>;

    /// Replace a stored supplier.
    ///
    /// Deactivating fails with [`StoreError::InUse`] while an active product
    /// references the supplier; an active supplier sharing a name or email with
    /// another active one fails with [`StoreError::Duplicate`].
    async fn update_supplier(&self, supplier: &Supplier) -> Result<(), StoreError>;

    async fn load_supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError>;

    async fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError>;

    /// Insert a new product, together with its opening ledger entry if any.
    ///
    /// A referenced supplier must exist and be active.
    async fn insert_product(
        &self,
        product: &Product,
        opening: Option<&StockTransaction>,
    ) -> Result<(), StoreError>;

    async fn load_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// All products, active or not, ordered by name.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Atomically replace the product state and append `movement`.
    ///
    /// `product` is the state *after* the movement was applied; the stored row
    /// must currently be at `expected_version`.
    async fn commit(
        &self,
        product: &Product,
        expected_version: ExpectedVersion,
        movement: Option<&StockTransaction>,
    ) -> Result<(), StoreError>;

    /// Ledger entries of one product, most recent first.
    async fn history(
        &self,
        product_id: ProductId,
        limit: Option<usize>,
    ) -> Result<Vec<StockTransaction>, StoreError>;

    /// Newest ledger entries across all products, most recent first.
    async fn recent_transactions(&self, limit: usize) -> Result<Vec<StockTransaction>, StoreError>;

    /// Ledger entries with `from <= created_at <= to`, oldest first.
    async fn transactions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StockTransaction>, StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        (**self).insert_user(user).await
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).load_user(id).await
    }

    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        (**self).insert_supplier(supplier).await
    }

    async fn update_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        (**self).update_supplier(supplier).await
    }

    async fn load_supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        (**self).load_supplier(id).await
    }

    async fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        (**self).list_suppliers().await
    }

    async fn insert_product(
        &self,
        product: &Product,
        opening: Option<&StockTransaction>,
    ) -> Result<(), StoreError> {
        (**self).insert_product(product, opening).await
    }

    async fn load_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).load_product(id).await
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list_products().await
    }

    async fn commit(
        &self,
        product: &Product,
        expected_version: ExpectedVersion,
        movement: Option<&StockTransaction>,
    ) -> Result<(), StoreError> {
        (**self).commit(product, expected_version, movement).await
    }

    async fn history(
        &self,
        product_id: ProductId,
        limit: Option<usize>,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        (**self).history(product_id, limit).await
    }

    async fn recent_transactions(&self, limit: usize) -> Result<Vec<StockTransaction>, StoreError> {
        (**self).recent_transactions(limit).await
    }

    async fn transactions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        (**self).transactions_between(from, to).await
    }
}

/// Check that a movement matches the product state it is committed with.
///
/// Shared by all backends so a buggy caller cannot persist an entry whose
/// arithmetic disagrees with the product row.
pub(crate) fn validate_movement(
    product: &Product,
    movement: &StockTransaction,
) -> Result<(), StoreError> {
    if movement.product_id != product.id_typed() {
        return Err(StoreError::InvalidWrite(format!(
            "movement {} targets product {}, committed with {}",
            movement.id,
            movement.product_id,
            product.id_typed()
        )));
    }
    if !movement.is_consistent() {
        return Err(StoreError::InvalidWrite(format!(
            "movement {} has inconsistent quantities ({} -> {})",
            movement.id, movement.quantity_before, movement.quantity_after
        )));
    }
    if movement.quantity_after != product.quantity() {
        return Err(StoreError::InvalidWrite(format!(
            "movement {} ends at {}, product is at {}",
            movement.id,
            movement.quantity_after,
            product.quantity()
        )));
    }
    Ok(())
}
