//! Logging setup for the stock ledger binaries.

pub mod tracing;

/// Fallback filter when `RUST_LOG` is unset. sqlx logs every statement at
/// info, so it is held to warnings.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Install the JSON subscriber. Repeated calls keep the first subscriber.
pub fn init() {
    self::tracing::init(DEFAULT_FILTER);
}
