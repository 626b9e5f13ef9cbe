//! Infrastructure layer: ledger storage, configuration and the stock engine.

pub mod config;
pub mod ledger;
pub mod locks;
pub mod store;

pub use config::{ConfigError, LedgerConfig};
pub use ledger::StockLedger;
pub use store::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, StoreError};

#[cfg(test)]
mod integration_tests;
