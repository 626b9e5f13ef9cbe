//! Ledger engine configuration loading.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a {expected} integer, got {value:?}")]
    InvalidNumber {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Runtime knobs of the stock engine and its storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Upper bound on any single storage call.
    pub storage_timeout: Duration,
    /// How often a consumption re-plans after a `Conflict` before giving up.
    pub max_commit_retries: u32,
    pub max_connections: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            storage_timeout: Duration::from_millis(5_000),
            max_commit_retries: 3,
            max_connections: 10,
        }
    }
}

impl LedgerConfig {
    /// Read `DATABASE_URL`, `STORAGE_TIMEOUT_MS`, `LEDGER_MAX_COMMIT_RETRIES`
    /// and `DATABASE_MAX_CONNECTIONS`; unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let storage_timeout = match parse_number(&lookup, "STORAGE_TIMEOUT_MS", 1)? {
            Some(ms) => Duration::from_millis(ms),
            None => defaults.storage_timeout,
        };
        // Zero retries is valid: the first conflict is returned as is.
        let max_commit_retries = parse_number(&lookup, "LEDGER_MAX_COMMIT_RETRIES", 0)?
            .map(|n| n as u32)
            .unwrap_or(defaults.max_commit_retries);
        let max_connections = parse_number(&lookup, "DATABASE_MAX_CONNECTIONS", 1)?
            .map(|n| n as u32)
            .unwrap_or(defaults.max_connections);

        Ok(Self {
            database_url,
            storage_timeout,
            max_commit_retries,
            max_connections,
        })
    }
}

fn parse_number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    min: u32,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u32>() {
        Ok(n) if n >= min => Ok(Some(u64::from(n))),
        _ => Err(ConfigError::InvalidNumber {
            key,
            expected: if min == 0 { "non-negative" } else { "positive" },
            value: raw,
        }),
    }
}
