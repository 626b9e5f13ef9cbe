//! Infrastructure wiring: pick the store and build the stock engine.

use std::sync::Arc;

use stockledger_infra::{
    InMemoryInventoryStore, InventoryStore, LedgerConfig, PostgresInventoryStore, StockLedger,
};

/// Engine type shared by every handler.
pub type Ledger = StockLedger<dyn InventoryStore>;

/// Postgres when `DATABASE_URL` is configured, in-memory otherwise.
pub async fn build_ledger(config: LedgerConfig) -> anyhow::Result<Arc<Ledger>> {
    let store: Arc<dyn InventoryStore> = match config.database_url.as_deref() {
        Some(url) => {
            let store =
                PostgresInventoryStore::connect(url, config.max_connections, config.storage_timeout)
                    .await?;
            store.migrate().await?;
            tracing::info!("using postgres inventory store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory inventory store");
            Arc::new(InMemoryInventoryStore::new())
        }
    };
    Ok(Arc::new(StockLedger::new(store, config)))
}

/// In-memory engine with default settings (tests, local runs).
pub fn in_memory_ledger() -> Arc<Ledger> {
    let store: Arc<dyn InventoryStore> = Arc::new(InMemoryInventoryStore::new());
    Arc::new(StockLedger::new(store, LedgerConfig::default()))
}
