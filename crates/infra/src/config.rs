//! Configuration loading and representation.
//!
//! Everything comes from the environment, with a default for each setting.
//! Unparseable values are an error rather than a silent fallback.

use thiserror::Error;

pub const ENV_MAX_COMMIT_ATTEMPTS: &str = "STOCK_LEDGER_MAX_COMMIT_ATTEMPTS";
pub const ENV_HISTORY_LIMIT: &str = "STOCK_LEDGER_HISTORY_LIMIT";
pub const ENV_TOP_PRODUCTS: &str = "STOCK_LEDGER_TOP_PRODUCTS";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DB_MAX_CONNECTIONS: &str = "STOCK_LEDGER_DB_MAX_CONNECTIONS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be at least 1")]
    Zero { key: &'static str },
}

/// Tunables of the stock ledger service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// How many times a movement is re-decided after losing a version race.
    pub max_commit_attempts: u32,
    /// Default page size for product history.
    pub history_limit: usize,
    /// Cap on the "top products" list of movement reports.
    pub top_products: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 5,
            history_limit: 50,
            top_products: 10,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_commit_attempts: positive(&lookup, ENV_MAX_COMMIT_ATTEMPTS, defaults.max_commit_attempts)?,
            history_limit: positive(&lookup, ENV_HISTORY_LIMIT, defaults.history_limit)?,
            top_products: positive(&lookup, ENV_TOP_PRODUCTS, defaults.top_products)?,
        })
    }
}

/// Postgres connection settings. `url: None` means "use the in-memory store".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: lookup(ENV_DATABASE_URL).filter(|url| !url.trim().is_empty()),
            max_connections: positive(&lookup, ENV_DB_MAX_CONNECTIONS, 5)?,
        })
    }
}

fn positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value = raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.clone(),
    })?;
    if value == T::default() {
        return Err(ConfigError::Zero { key });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(LedgerConfig::from_lookup(lookup(&[])).unwrap(), LedgerConfig::default());
        let db = DatabaseConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(db.url, None);
        assert_eq!(db.max_connections, 5);
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (ENV_MAX_COMMIT_ATTEMPTS, " 8 "),
            (ENV_HISTORY_LIMIT, "20"),
        ]))
        .unwrap();
        assert_eq!(config.max_commit_attempts, 8);
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.top_products, 10);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert_eq!(
            LedgerConfig::from_lookup(lookup(&[(ENV_TOP_PRODUCTS, "ten")])),
            Err(ConfigError::InvalidNumber {
                key: ENV_TOP_PRODUCTS,
                value: "ten".to_string()
            })
        );
        assert_eq!(
            LedgerConfig::from_lookup(lookup(&[(ENV_MAX_COMMIT_ATTEMPTS, "0")])),
            Err(ConfigError::Zero {
                key: ENV_MAX_COMMIT_ATTEMPTS
            })
        );
        assert!(LedgerConfig::from_lookup(lookup(&[(ENV_HISTORY_LIMIT, "-1")])).is_err());
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let db = DatabaseConfig::from_lookup(lookup(&[(ENV_DATABASE_URL, "  ")])).unwrap();
        assert_eq!(db.url, None);
    }
}
