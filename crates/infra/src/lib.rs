//! Infrastructure layer: storage backends, configuration, and the stock ledger service.

pub mod config;
pub mod ledger;
pub mod store;

pub use config::{ConfigError, DatabaseConfig, LedgerConfig};
pub use ledger::{LedgerError, StockLedger};
pub use store::{InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, StoreError};
