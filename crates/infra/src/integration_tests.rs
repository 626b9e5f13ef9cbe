//! Integration tests for the stock ledger engine.
//!
//! Tests: Command → StockLedger → InventoryStore → Report/Reconciliation
//!
//! Verifies:
//! - FIFO consumption order and per-step stock-out quantities
//! - The reconciliation invariant across arbitrary receive/consume sequences
//! - Shortfalls are surfaced, never reported as full success
//! - Concurrent consumptions of the same units never double-spend
//! - Conflict re-planning and storage timeouts

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;

    use stockledger_core::{OperatorId, ProductId};
    use stockledger_inventory::{
        ConsumptionPlan, DispenseStock, ReceiveStock, StockError, StockInEntry, StockOutEntry,
        plan_consumption,
    };
    use stockledger_products::{EditProduct, NewProduct, Product, ProductDetails};

    use crate::config::LedgerConfig;
    use crate::ledger::StockLedger;
    use crate::store::{InMemoryInventoryStore, InventoryStore, StoreError};

    fn op() -> OperatorId {
        OperatorId::parse("operator-7").unwrap()
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn details() -> ProductDetails {
        ProductDetails {
            name: "Kopi Tubruk".to_string(),
            brand: "Kapal Api".to_string(),
            category: "coffee".to_string(),
            price: 12_500,
        }
    }

    fn new_product(initial_quantity: i64) -> NewProduct {
        NewProduct {
            details: details(),
            initial_quantity,
            operator_id: op(),
            occurred_at: t(0),
        }
    }

    fn receive(product_id: ProductId, quantity: i64, at: i64) -> ReceiveStock {
        ReceiveStock {
            product_id,
            quantity,
            operator_id: op(),
            occurred_at: t(at),
        }
    }

    fn dispense(product_id: ProductId, quantity: i64, at: i64) -> DispenseStock {
        DispenseStock {
            product_id,
            quantity,
            operator_id: op(),
            occurred_at: t(at),
        }
    }

    fn ledger() -> StockLedger<InMemoryInventoryStore> {
        StockLedger::new(
            Arc::new(InMemoryInventoryStore::new()),
            LedgerConfig::default(),
        )
    }

    async fn assert_reconciled<S: InventoryStore + ?Sized>(
        ledger: &StockLedger<S>,
        product_id: ProductId,
    ) {
        let r = ledger.reconcile(product_id).await.unwrap();
        assert!(r.is_consistent(), "ledger out of balance: {r:?}");
    }

    #[tokio::test]
    async fn fifo_drains_oldest_batch_then_splits_next() {
        let ledger = ledger();
        let product = ledger.create_product(new_product(0)).await.unwrap();
        let pid = product.id();
        let a = ledger.receive(receive(pid, 5, 1)).await.unwrap();
        let b = ledger.receive(receive(pid, 5, 2)).await.unwrap();

        let consumption = ledger.consume(dispense(pid, 7, 3)).await.unwrap();

        let steps: Vec<_> = consumption
            .stock_out
            .iter()
            .map(|e| (e.stock_in_id, e.quantity))
            .collect();
        assert_eq!(steps, vec![(a.id, 5), (b.id, 2)]);
        assert_eq!(consumption.consumed(), 7);
        assert!(!consumption.is_partial());

        let history = ledger.ledger_history(pid).await.unwrap();
        let remaining: Vec<_> = history.stock_in.iter().map(|e| e.quantity).collect();
        assert_eq!(remaining, vec![0, 3]);
        assert_eq!(ledger.get_product(pid).await.unwrap().quantity(), 3);
        assert_reconciled(&ledger, pid).await;
    }

    #[tokio::test]
    async fn report_counts_drained_batches_and_actual_steps() {
        let ledger = ledger();
        let pid = ledger.create_product(new_product(5)).await.unwrap().id();
        ledger.receive(receive(pid, 5, 1)).await.unwrap();
        ledger.consume(dispense(pid, 7, 2)).await.unwrap();

        let report = ledger.build_report(pid).await.unwrap();
        assert_eq!(report.product_name, "Kopi Tubruk");
        assert_eq!(report.brand_name, "Kapal Api");
        assert_eq!(report.first_in_stock, 10);
        assert_eq!(report.first_out_stock, 7);
        assert_eq!(report.stock_availability, 3);
        assert_eq!(report.initial_stock, 3);
    }

    #[tokio::test]
    async fn report_totals_stay_exact_when_the_lifetime_total_is_full() {
        let ledger = ledger();
        let pid = ledger.create_product(new_product(0)).await.unwrap().id();
        ledger.receive(receive(pid, i64::MAX, 1)).await.unwrap();
        ledger.consume(dispense(pid, i64::MAX, 2)).await.unwrap();

        // The counter has room again; Σ stock-in does not.
        let err = ledger.receive(receive(pid, 1, 3)).await.unwrap_err();
        assert!(matches!(err, StockError::InvalidInput(_)));
        assert!(!err.is_retryable());

        let report = ledger.build_report(pid).await.unwrap();
        assert_eq!(report.first_in_stock, i64::MAX);
        assert_eq!(report.first_out_stock, i64::MAX);
        assert_eq!(report.stock_availability, 0);
        assert_reconciled(&ledger, pid).await;
    }

    #[tokio::test]
    async fn receipt_overflowing_the_counter_is_invalid_input() {
        let ledger = ledger();
        let pid = ledger.create_product(new_product(5)).await.unwrap().id();

        let err = ledger.receive(receive(pid, i64::MAX, 1)).await.unwrap_err();
        assert!(matches!(err, StockError::InvalidInput(_)), "{err:?}");
        assert!(!err.is_retryable());

        assert_eq!(ledger.get_product(pid).await.unwrap().quantity(), 5);
        assert_eq!(ledger.ledger_history(pid).await.unwrap().stock_in.len(), 1);
        assert_reconciled(&ledger, pid).await;
    }

    #[tokio::test]
    async fn report_is_idempotent_without_writes() {
        let ledger = ledger();
        let pid = ledger.create_product(new_product(9)).await.unwrap().id();
        ledger.consume(dispense(pid, 4, 1)).await.unwrap();

        let first = ledger.build_report(pid).await.unwrap();
        let second = ledger.build_report(pid).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected_before_touching_storage() {
        let ledger = ledger();
        let pid = ledger.create_product(new_product(5)).await.unwrap().id();

        let err = ledger.consume(dispense(pid, 0, 1)).await.unwrap_err();
        assert!(matches!(err, StockError::InvalidInput(_)));
        let err = ledger.receive(receive(pid, -2, 1)).await.unwrap_err();
        assert!(matches!(err, StockError::InvalidInput(_)));

        assert_eq!(ledger.get_product(pid).await.unwrap().quantity(), 5);
        assert_eq!(ledger.ledger_history(pid).await.unwrap().stock_out.len(), 0);
    }

    #[tokio::test]
    async fn consuming_without_open_batches_is_out_of_stock() {
        let ledger = ledger();
        let pid = ledger.create_product(new_product(0)).await.unwrap().id();

        let err = ledger.consume(dispense(pid, 1, 1)).await.unwrap_err();
        assert_eq!(err, StockError::OutOfStock(pid));
        assert!(ledger.ledger_history(pid).await.unwrap().stock_out.is_empty());
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let ledger = ledger();
        let missing = ProductId::new(404);

        assert_eq!(
            ledger.consume(dispense(missing, 1, 1)).await.unwrap_err(),
            StockError::ProductNotFound(missing)
        );
        assert_eq!(
            ledger.receive(receive(missing, 1, 1)).await.unwrap_err(),
            StockError::ProductNotFound(missing)
        );
        assert_eq!(
            ledger.build_report(missing).await.unwrap_err(),
            StockError::ProductNotFound(missing)
        );
    }

    #[tokio::test]
    async fn shortfall_consumes_what_exists_and_reports_the_gap() {
        let ledger = ledger();
        let pid = ledger.create_product(new_product(5)).await.unwrap().id();

        let consumption = ledger.consume(dispense(pid, 8, 1)).await.unwrap();
        assert_eq!(consumption.consumed(), 5);
        assert_eq!(consumption.shortfall(), 3);

        let err = consumption.into_full().unwrap_err();
        assert_eq!(
            err,
            StockError::PartialFulfillment {
                product_id: pid,
                requested: 8,
                consumed: 5
            }
        );
        assert_eq!(ledger.get_product(pid).await.unwrap().quantity(), 0);
        assert_reconciled(&ledger, pid).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumers_never_double_spend() {
        let ledger = Arc::new(ledger());
        let pid = ledger.create_product(new_product(5)).await.unwrap().id();

        let spawn = |at| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.consume(dispense(pid, 5, at)).await })
        };
        let (a, b) = tokio::join!(spawn(1), spawn(2));
        let results = [a.unwrap(), b.unwrap()];

        let shipped: Vec<i64> = results
            .iter()
            .filter_map(|r| r.as_ref().ok().map(|c| c.consumed()))
            .collect();
        assert_eq!(shipped, vec![5]);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(StockError::OutOfStock(id)) if *id == pid))
        );
        assert_eq!(ledger.get_product(pid).await.unwrap().quantity(), 0);
        assert_reconciled(ledger.as_ref(), pid).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn engines_sharing_a_store_serialize_through_the_commit_check() {
        // Two engines have independent locks, like two server processes.
        let store = Arc::new(InMemoryInventoryStore::new());
        let first = Arc::new(StockLedger::new(Arc::clone(&store), LedgerConfig::default()));
        let second = Arc::new(StockLedger::new(Arc::clone(&store), LedgerConfig::default()));
        let pid = first.create_product(new_product(5)).await.unwrap().id();

        let mut handles = Vec::new();
        for (i, engine) in [first.clone(), second, first.clone(), Arc::clone(&first)]
            .into_iter()
            .enumerate()
        {
            handles.push(tokio::spawn(async move {
                engine.consume(dispense(pid, 2, i as i64)).await
            }));
        }

        let mut shipped = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(c) => shipped += c.consumed(),
                Err(StockError::OutOfStock(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(shipped, 5);
        assert_eq!(store.sum_stock_out(pid).await.unwrap(), 5);
        assert_reconciled(first.as_ref(), pid).await;
    }

    #[tokio::test]
    async fn quantity_edits_go_through_the_ledger() {
        let ledger = ledger();
        let pid = ledger.create_product(new_product(4)).await.unwrap().id();

        let edit = |quantity| EditProduct {
            product_id: pid,
            details: details(),
            quantity,
            operator_id: op(),
            occurred_at: t(10),
        };

        assert_eq!(ledger.edit_product(edit(Some(10))).await.unwrap().quantity(), 10);
        assert_reconciled(&ledger, pid).await;

        assert_eq!(ledger.edit_product(edit(Some(3))).await.unwrap().quantity(), 3);
        assert_reconciled(&ledger, pid).await;

        let history = ledger.ledger_history(pid).await.unwrap();
        assert_eq!(history.stock_in.len(), 2);
        assert_eq!(history.stock_out.iter().map(|e| e.quantity).sum::<i64>(), 7);
    }

    #[tokio::test]
    async fn detail_edits_leave_the_counter_alone() {
        let ledger = ledger();
        let pid = ledger.create_product(new_product(6)).await.unwrap().id();

        let mut renamed = details();
        renamed.name = "Kopi Tubruk Gula".to_string();
        let product = ledger
            .edit_product(EditProduct {
                product_id: pid,
                details: renamed,
                quantity: None,
                operator_id: op(),
                occurred_at: t(1),
            })
            .await
            .unwrap();

        assert_eq!(product.name(), "Kopi Tubruk Gula");
        assert_eq!(product.quantity(), 6);
        assert!(ledger.ledger_history(pid).await.unwrap().stock_out.is_empty());
    }

    /// Delegates to the in-memory store, with scripted interference.
    #[derive(Default)]
    struct ScriptedStore {
        inner: InMemoryInventoryStore,
        /// Commits preceded by an outside writer draining one unit.
        interfere: AtomicU32,
        always_conflict: bool,
        stall_reads: bool,
        /// Cap on listed open batches, as when the counter drifted from the
        /// ledger.
        open_batch_limit: Option<usize>,
        commits: AtomicU32,
    }

    #[async_trait]
    impl InventoryStore for ScriptedStore {
        async fn create_product(
            &self,
            cmd: &NewProduct,
        ) -> Result<(Product, Option<StockInEntry>), StoreError> {
            self.inner.create_product(cmd).await
        }

        async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
            if self.stall_reads {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            self.inner.get_product(product_id).await
        }

        async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
            self.inner.list_products().await
        }

        async fn update_product_details(
            &self,
            product_id: ProductId,
            details: &ProductDetails,
        ) -> Result<Product, StoreError> {
            self.inner.update_product_details(product_id, details).await
        }

        async fn record_stock_in(&self, cmd: &ReceiveStock) -> Result<StockInEntry, StoreError> {
            self.inner.record_stock_in(cmd).await
        }

        async fn list_open_stock_in(
            &self,
            product_id: ProductId,
        ) -> Result<Vec<StockInEntry>, StoreError> {
            let mut open = self.inner.list_open_stock_in(product_id).await?;
            if let Some(limit) = self.open_batch_limit {
                open.truncate(limit);
            }
            Ok(open)
        }

        async fn commit_consumption(
            &self,
            plan: &ConsumptionPlan,
            operator_id: &OperatorId,
            at: DateTime<Utc>,
        ) -> Result<Vec<StockOutEntry>, StoreError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            if self.always_conflict {
                return Err(StoreError::Conflict("scripted".to_string()));
            }
            let pending = self.interfere.load(Ordering::SeqCst);
            if pending > 0 {
                self.interfere.store(pending - 1, Ordering::SeqCst);
                let open = self.inner.list_open_stock_in(plan.product_id()).await?;
                let outside = plan_consumption(plan.product_id(), &open, 1)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                let outsider = OperatorId::parse("other-process").unwrap();
                self.inner.commit_consumption(&outside, &outsider, at).await?;
            }
            self.inner.commit_consumption(plan, operator_id, at).await
        }

        async fn sum_stock_in(&self, product_id: ProductId) -> Result<i64, StoreError> {
            self.inner.sum_stock_in(product_id).await
        }

        async fn sum_stock_out(&self, product_id: ProductId) -> Result<i64, StoreError> {
            self.inner.sum_stock_out(product_id).await
        }

        async fn list_stock_in(
            &self,
            product_id: ProductId,
        ) -> Result<Vec<StockInEntry>, StoreError> {
            self.inner.list_stock_in(product_id).await
        }

        async fn list_stock_out(
            &self,
            product_id: ProductId,
        ) -> Result<Vec<StockOutEntry>, StoreError> {
            self.inner.list_stock_out(product_id).await
        }
    }

    #[tokio::test]
    async fn stale_plan_is_replanned_after_conflict() {
        let store = Arc::new(ScriptedStore {
            interfere: AtomicU32::new(1),
            ..ScriptedStore::default()
        });
        let ledger = StockLedger::new(Arc::clone(&store), LedgerConfig::default());
        let pid = ledger.create_product(new_product(5)).await.unwrap().id();

        let consumption = ledger.consume(dispense(pid, 3, 1)).await.unwrap();
        assert_eq!(consumption.consumed(), 3);
        // Stale commit rejected, re-planned commit accepted.
        assert_eq!(store.commits.load(Ordering::SeqCst), 2);
        assert_eq!(ledger.get_product(pid).await.unwrap().quantity(), 1);
        assert_eq!(store.sum_stock_out(pid).await.unwrap(), 4);
        assert_reconciled(&ledger, pid).await;
    }

    #[tokio::test]
    async fn conflict_surfaces_once_retries_are_exhausted() {
        let store = Arc::new(ScriptedStore {
            always_conflict: true,
            ..ScriptedStore::default()
        });
        let config = LedgerConfig {
            max_commit_retries: 2,
            ..LedgerConfig::default()
        };
        let ledger = StockLedger::new(Arc::clone(&store), config);
        let pid = ledger.create_product(new_product(5)).await.unwrap().id();

        let err = ledger.consume(dispense(pid, 1, 1)).await.unwrap_err();
        assert!(matches!(err, StockError::Conflict(_)));
        assert!(err.is_retryable());
        assert_eq!(store.commits.load(Ordering::SeqCst), 3);
        let product = store.inner.get_product(pid).await.unwrap().unwrap();
        assert_eq!(product.quantity(), 5);
    }

    fn drifted_ledger(open_batch_limit: usize) -> (Arc<ScriptedStore>, StockLedger<ScriptedStore>) {
        let store = Arc::new(ScriptedStore {
            open_batch_limit: Some(open_batch_limit),
            ..ScriptedStore::default()
        });
        let ledger = StockLedger::new(Arc::clone(&store), LedgerConfig::default());
        (store, ledger)
    }

    fn renamed_to(quantity: i64, product_id: ProductId) -> EditProduct {
        let mut renamed = details();
        renamed.name = "Kopi Tubruk Susu".to_string();
        EditProduct {
            product_id,
            details: renamed,
            quantity: Some(quantity),
            operator_id: op(),
            occurred_at: t(5),
        }
    }

    #[tokio::test]
    async fn failed_quantity_cut_leaves_details_untouched() {
        let (store, ledger) = drifted_ledger(0);
        let pid = ledger.create_product(new_product(6)).await.unwrap().id();

        let err = ledger.edit_product(renamed_to(2, pid)).await.unwrap_err();
        assert_eq!(err, StockError::OutOfStock(pid));

        let product = ledger.get_product(pid).await.unwrap();
        assert_eq!(product.name(), "Kopi Tubruk");
        assert_eq!(product.quantity(), 6);
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn partially_coverable_cut_drains_nothing() {
        let (store, ledger) = drifted_ledger(1);
        let pid = ledger.create_product(new_product(4)).await.unwrap().id();
        ledger.receive(receive(pid, 3, 1)).await.unwrap();

        // Counter 7, but only the 4-unit batch is visible: a cut of 6 can't
        // be met and must not drain that batch.
        let err = ledger.edit_product(renamed_to(1, pid)).await.unwrap_err();
        assert_eq!(
            err,
            StockError::PartialFulfillment {
                product_id: pid,
                requested: 6,
                consumed: 0
            }
        );

        let product = ledger.get_product(pid).await.unwrap();
        assert_eq!(product.name(), "Kopi Tubruk");
        assert_eq!(product.quantity(), 7);
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
        assert_eq!(store.sum_stock_out(pid).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn slow_storage_times_out_as_unavailable() {
        let store = Arc::new(ScriptedStore {
            stall_reads: true,
            ..ScriptedStore::default()
        });
        let config = LedgerConfig {
            storage_timeout: Duration::from_millis(20),
            ..LedgerConfig::default()
        };
        let ledger = StockLedger::new(store, config);

        let err = ledger.build_report(ProductId::new(1)).await.unwrap_err();
        assert!(matches!(err, StockError::StorageUnavailable(msg) if msg.contains("timed out")));
    }

    #[derive(Debug, Clone)]
    enum Movement {
        Receive(i64),
        Consume(i64),
    }

    fn movement() -> impl Strategy<Value = Movement> {
        prop_oneof![
            (1i64..20).prop_map(Movement::Receive),
            (1i64..30).prop_map(Movement::Consume),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: Σ stock-in original − Σ stock-out == live quantity after
        /// any sequence of receipts and consumptions, and the counter never
        /// goes negative.
        #[test]
        fn reconciliation_holds_for_any_movement_sequence(
            opening in 0i64..20,
            movements in prop::collection::vec(movement(), 0..25),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let ledger = ledger();
                let pid = ledger.create_product(new_product(opening)).await.unwrap().id();
                let mut expected = opening;

                for (i, m) in movements.iter().enumerate() {
                    let at = i as i64 + 1;
                    match m {
                        Movement::Receive(q) => {
                            ledger.receive(receive(pid, *q, at)).await.unwrap();
                            expected += q;
                        }
                        Movement::Consume(q) => match ledger.consume(dispense(pid, *q, at)).await {
                            Ok(c) => {
                                prop_assert_eq!(c.consumed(), (*q).min(expected));
                                expected -= c.consumed();
                            }
                            Err(StockError::OutOfStock(_)) => prop_assert_eq!(expected, 0),
                            Err(other) => prop_assert!(false, "unexpected error: {}", other),
                        },
                    }

                    let r = ledger.reconcile(pid).await.unwrap();
                    prop_assert!(r.is_consistent(), "{:?}", r);
                    prop_assert_eq!(r.live_quantity, expected);
                    prop_assert!(r.live_quantity >= 0);
                }
                Ok(())
            })?;
        }
    }
}
