//! Stock ledger engine (application-level orchestration).
//!
//! `StockLedger` composes an [`InventoryStore`] with the pure domain rules of
//! `stockledger-inventory`. Every quantity-changing operation follows the same
//! pipeline:
//!
//! ```text
//! Command
//!   ↓
//! 1. Validate (pure, before any IO)
//!   ↓
//! 2. Take the per-product lock
//!   ↓
//! 3. Load current ledger state
//!   ↓
//! 4. Decide (pure: plan_consumption, compensating deltas)
//!   ↓
//! 5. Commit atomically (optimistic check, re-plan on Conflict)
//! ```
//!
//! Every storage call is bounded by `LedgerConfig::storage_timeout`; an
//! elapsed timer surfaces as `StockError::StorageUnavailable`.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use stockledger_core::{OperatorId, ProductId};
use stockledger_inventory::{
    Consumption, DispenseStock, LedgerHistory, ReceiveStock, Reconciliation, StockError,
    StockInEntry, StockReport, plan_consumption,
};
use stockledger_products::{EditProduct, NewProduct, Product};

use crate::config::LedgerConfig;
use crate::locks::ProductLocks;
use crate::store::{InventoryStore, StoreError};

pub struct StockLedger<S: InventoryStore + ?Sized> {
    store: Arc<S>,
    locks: ProductLocks,
    config: LedgerConfig,
}

impl<S: InventoryStore + ?Sized> StockLedger<S> {
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        Self {
            store,
            locks: ProductLocks::new(),
            config,
        }
    }

    async fn call<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StockError> {
        match tokio::time::timeout(self.config.storage_timeout, fut).await {
            Ok(result) => result.map_err(StockError::from),
            Err(_) => {
                warn!(op, timeout = ?self.config.storage_timeout, "storage call timed out");
                Err(StockError::storage(format!(
                    "{op} timed out after {}ms",
                    self.config.storage_timeout.as_millis()
                )))
            }
        }
    }

    async fn require_product(&self, product_id: ProductId) -> Result<Product, StockError> {
        self.call("get_product", self.store.get_product(product_id))
            .await?
            .ok_or(StockError::ProductNotFound(product_id))
    }

    /// Register a product. A positive opening quantity is booked as the
    /// product's first stock-in batch.
    #[instrument(skip(self, cmd), fields(name = %cmd.details.name), err)]
    pub async fn create_product(&self, cmd: NewProduct) -> Result<Product, StockError> {
        cmd.validate()?;
        let (product, opening) = self
            .call("create_product", self.store.create_product(&cmd))
            .await?;
        info!(
            product_id = %product.id(),
            opening_batch = ?opening.as_ref().map(|e| e.id),
            quantity = product.quantity(),
            "product created"
        );
        Ok(product)
    }

    /// Update display attributes and, when a target quantity is given, move
    /// the counter there through a compensating ledger movement.
    ///
    /// A raise is booked as a stock-in; a cut is consumed FIFO. The movement
    /// runs first and a cut the open batches cannot cover is refused before
    /// anything is written, so a failed edit leaves the product as it was.
    #[instrument(skip(self, cmd), fields(product_id = %cmd.product_id), err)]
    pub async fn edit_product(&self, cmd: EditProduct) -> Result<Product, StockError> {
        cmd.validate()?;
        let _guard = self.locks.lock(cmd.product_id).await;
        let current = self.require_product(cmd.product_id).await?;

        if let Some(target) = cmd.quantity {
            let delta = target - current.quantity();
            if delta > 0 {
                let receipt = ReceiveStock {
                    product_id: cmd.product_id,
                    quantity: delta,
                    operator_id: cmd.operator_id.clone(),
                    occurred_at: cmd.occurred_at,
                };
                self.call("record_stock_in", self.store.record_stock_in(&receipt))
                    .await?;
            } else if delta < 0 {
                let cut = -delta;
                let open = self
                    .call("list_open_stock_in", self.store.list_open_stock_in(cmd.product_id))
                    .await?;
                let plan = plan_consumption(cmd.product_id, &open, cut)?;
                if plan.is_partial() {
                    warn!(
                        cut,
                        coverable = plan.consumed(),
                        "open batches cannot cover quantity edit"
                    );
                    return Err(StockError::PartialFulfillment {
                        product_id: cmd.product_id,
                        requested: cut,
                        consumed: 0,
                    });
                }
                self.consume_locked(cmd.product_id, cut, &cmd.operator_id, cmd.occurred_at)
                    .await?
                    .into_full()?;
            }
            if delta != 0 {
                info!(delta, target, "quantity adjusted through the ledger");
            }
        }

        self.call(
            "update_product_details",
            self.store.update_product_details(cmd.product_id, &cmd.details),
        )
        .await
    }

    pub async fn get_product(&self, product_id: ProductId) -> Result<Product, StockError> {
        self.require_product(product_id).await
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, StockError> {
        self.call("list_products", self.store.list_products()).await
    }

    /// Book an inbound batch and raise the counter by its quantity.
    #[instrument(
        skip(self, cmd),
        fields(product_id = %cmd.product_id, quantity = cmd.quantity),
        err
    )]
    pub async fn receive(&self, cmd: ReceiveStock) -> Result<StockInEntry, StockError> {
        cmd.validate()?;
        let _guard = self.locks.lock(cmd.product_id).await;
        let entry = self
            .call("record_stock_in", self.store.record_stock_in(&cmd))
            .await?;
        info!(stock_in_id = %entry.id, "stock received");
        Ok(entry)
    }

    /// Consume stock oldest batch first.
    ///
    /// Returns what actually shipped. A request larger than the open stock
    /// still drains every open batch; the caller sees the gap through
    /// [`Consumption::shortfall`] or [`Consumption::into_full`].
    #[instrument(
        skip(self, cmd),
        fields(product_id = %cmd.product_id, requested = cmd.quantity),
        err
    )]
    pub async fn consume(&self, cmd: DispenseStock) -> Result<Consumption, StockError> {
        cmd.validate()?;
        let _guard = self.locks.lock(cmd.product_id).await;
        self.require_product(cmd.product_id).await?;
        self.consume_locked(cmd.product_id, cmd.quantity, &cmd.operator_id, cmd.occurred_at)
            .await
    }

    /// Caller must hold the product lock.
    async fn consume_locked(
        &self,
        product_id: ProductId,
        requested: i64,
        operator_id: &OperatorId,
        at: DateTime<Utc>,
    ) -> Result<Consumption, StockError> {
        let mut retries = 0;
        loop {
            let open = self
                .call("list_open_stock_in", self.store.list_open_stock_in(product_id))
                .await?;
            let plan = plan_consumption(product_id, &open, requested)?;

            match self
                .call(
                    "commit_consumption",
                    self.store.commit_consumption(&plan, operator_id, at),
                )
                .await
            {
                Ok(stock_out) => {
                    let consumption = Consumption {
                        product_id,
                        requested,
                        stock_out,
                    };
                    if consumption.is_partial() {
                        warn!(
                            consumed = consumption.consumed(),
                            shortfall = consumption.shortfall(),
                            "stock exhausted before request was met"
                        );
                    } else {
                        info!(
                            consumed = consumption.consumed(),
                            batches = consumption.stock_out.len(),
                            "stock consumed"
                        );
                    }
                    return Ok(consumption);
                }
                Err(StockError::Conflict(reason)) if retries < self.config.max_commit_retries => {
                    retries += 1;
                    warn!(%reason, retries, "ledger moved during consumption, re-planning");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Audit report for one product. Read-only.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn build_report(&self, product_id: ProductId) -> Result<StockReport, StockError> {
        let product = self.require_product(product_id).await?;
        let total_in = self
            .call("sum_stock_in", self.store.sum_stock_in(product_id))
            .await?;
        let total_out = self
            .call("sum_stock_out", self.store.sum_stock_out(product_id))
            .await?;
        Ok(StockReport::build(&product, total_in, total_out))
    }

    /// Compare the live counter with the ledger totals.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn reconcile(&self, product_id: ProductId) -> Result<Reconciliation, StockError> {
        let product = self.require_product(product_id).await?;
        let total_in = self
            .call("sum_stock_in", self.store.sum_stock_in(product_id))
            .await?;
        let total_out = self
            .call("sum_stock_out", self.store.sum_stock_out(product_id))
            .await?;
        let open = self
            .call("list_open_stock_in", self.store.list_open_stock_in(product_id))
            .await?
            .iter()
            .fold(0i64, |acc, e| acc.saturating_add(e.quantity));

        let reconciliation = Reconciliation::new(&product, total_in, total_out, open);
        if !reconciliation.is_consistent() {
            warn!(
                drift = reconciliation.drift(),
                ledger = reconciliation.ledger_quantity,
                live = reconciliation.live_quantity,
                open_batches = reconciliation.open_batch_quantity,
                "stock counter disagrees with ledger"
            );
        }
        Ok(reconciliation)
    }

    pub async fn ledger_history(&self, product_id: ProductId) -> Result<LedgerHistory, StockError> {
        self.require_product(product_id).await?;
        let stock_in = self
            .call("list_stock_in", self.store.list_stock_in(product_id))
            .await?;
        let stock_out = self
            .call("list_stock_out", self.store.list_stock_out(product_id))
            .await?;
        Ok(LedgerHistory {
            product_id,
            stock_in,
            stock_out,
        })
    }
}
