//! Per-product serialization of ledger writes.
//!
//! Consumptions against the same product queue behind one async mutex;
//! different products proceed in parallel. The storage-level optimistic check
//! still guards writers outside this process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use stockledger_core::ProductId;

#[derive(Debug, Default)]
pub struct ProductLocks {
    inner: Mutex<HashMap<ProductId, Arc<AsyncMutex<()>>>>,
}

impl ProductLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `product_id`'s ledger.
    pub async fn lock(&self, product_id: ProductId) -> OwnedMutexGuard<()> {
        let slot = {
            // The map only holds handles, so a poisoned guard is still usable.
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(map.entry(product_id).or_default())
        };
        slot.lock_owned().await
    }
}
