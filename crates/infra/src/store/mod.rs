//! Persistence boundary for products, their ledger entries, users, and suppliers.
//!
//! The ledger itself is append-only: backends insert `StockTransaction` rows
//! and never update or delete them.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{LedgerStore, StoreError};
