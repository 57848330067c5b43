//! The stock ledger service.
//!
//! `StockLedger` is the only writer of product quantities. A write holds the
//! product's in-process lock for its whole duration and, inside it, loads the
//! product, decides the command against that state, and commits the new state
//! together with the ledger entry guarded by the loaded version. A stale
//! version sends the writer back to the load step, at most
//! `max_commit_attempts` times.
//!
//! The lock orders writers inside one process; the version guard orders
//! writers in different processes sharing a database.

mod catalog;
mod error;
mod locks;
mod reports;

pub use error::LedgerError;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::instrument;

use stockledger_core::{Aggregate, Entity, ExpectedVersion, ProductId, TransactionId, UserId};
use stockledger_inventory::{
    AdjustStock, Direction, Product, ProductCommand, ProductEvent, StockTransaction, User,
};

use crate::config::LedgerConfig;
use crate::store::{LedgerStore, StoreError};

use locks::ProductLocks;

/// Wall-clock time truncated to microseconds, the resolution Postgres stores.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// The stock ledger: apply movements, maintain the catalog, and read reports.
///
/// Generic over the store so tests run against `InMemoryLedgerStore` and
/// production against `PostgresLedgerStore`.
#[derive(Debug)]
pub struct StockLedger<S> {
    store: S,
    config: LedgerConfig,
    locks: ProductLocks,
}

impl<S> StockLedger<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, LedgerConfig::default())
    }

    pub fn with_config(store: S, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            locks: ProductLocks::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

impl<S> StockLedger<S>
where
    S: LedgerStore,
{
    /// Record a stock movement and return the created ledger entry.
    ///
    /// Fails with `InvalidQuantity` for `magnitude <= 0`, `InsufficientStock`
    /// when removing more than is on hand, `InactiveProduct` for a soft-deleted
    /// product and `NotFound` for an unknown product or actor. On failure nothing
    /// is written.
    #[instrument(
        skip_all,
        fields(product_id = %product_id, direction = %direction, magnitude = magnitude, actor = %actor),
        err
    )]
    pub async fn apply(
        &self,
        product_id: ProductId,
        direction: Direction,
        magnitude: i64,
        actor: UserId,
        note: Option<String>,
    ) -> Result<StockTransaction, LedgerError> {
        if magnitude <= 0 {
            tracing::debug!("rejected non-positive magnitude");
            return Err(LedgerError::InvalidQuantity(magnitude));
        }
        self.active_user(actor).await?;

        // One id per call: a retried attempt records the same entry.
        let transaction_id = TransactionId::new();
        let (_, events) = self
            .execute(product_id, |_| {
                ProductCommand::AdjustStock(AdjustStock {
                    transaction_id,
                    product_id,
                    direction,
                    magnitude,
                    actor,
                    note: note.clone(),
                    occurred_at: now(),
                })
            })
            .await?;

        let transaction = events
            .into_iter()
            .find_map(|e| match e {
                ProductEvent::StockMoved(t) => Some(t),
                _ => None,
            })
            .ok_or_else(|| {
                LedgerError::PersistenceFailure(StoreError::InvalidWrite(format!(
                    "adjusting product {product_id} produced no ledger entry"
                )))
            })?;

        tracing::info!(
            transaction_id = %transaction.id,
            quantity_before = transaction.quantity_before,
            quantity_after = transaction.quantity_after,
            "stock movement recorded"
        );
        Ok(transaction)
    }

    /// Load, decide and commit one product command under the product lock.
    ///
    /// `make_command` is called once per attempt with the freshly loaded product.
    async fn execute(
        &self,
        product_id: ProductId,
        make_command: impl Fn(&Product) -> ProductCommand,
    ) -> Result<(Product, Vec<ProductEvent>), LedgerError> {
        let _guard = self.locks.acquire(product_id).await;

        let max_attempts = self.config.max_commit_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;

            let current = self
                .store
                .load_product(product_id)
                .await?
                .ok_or_else(|| LedgerError::NotFound(format!("product {product_id}")))?;

            let mut next = current.clone();
            let events = next.execute(&make_command(&current)).map_err(|e| {
                if e.is_input_error() {
                    tracing::debug!(error = %e, "command rejected");
                } else {
                    tracing::info!(error = %e, "command refused by product state");
                }
                LedgerError::from(e)
            })?;
            let movement = events.iter().find_map(ProductEvent::as_stock_movement);

            match self
                .store
                .commit(&next, ExpectedVersion::of(&current), movement)
                .await
            {
                Ok(()) => return Ok((next, events)),
                Err(StoreError::Concurrency(msg)) if attempt < max_attempts => {
                    tracing::warn!(attempt, %msg, "lost version race, retrying");
                }
                Err(StoreError::Concurrency(msg)) => {
                    return Err(LedgerError::Conflict(format!(
                        "product {product_id} still contended after {attempt} attempts: {msg}"
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Load an actor that may write to the ledger.
    async fn active_user(&self, id: UserId) -> Result<User, LedgerError> {
        match self.store.load_user(id).await? {
            Some(user) if user.is_active() => Ok(user),
            _ => Err(LedgerError::NotFound(format!("user {id}"))),
        }
    }
}
