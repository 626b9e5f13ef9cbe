use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockledger_core::{EntryId, OperatorId, ProductId};
use stockledger_inventory::{ConsumptionPlan, ReceiveStock, StockInEntry, StockOutEntry};
use stockledger_products::{NewProduct, Product, ProductDetails};

use super::{InventoryStore, StoreError};

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    stock_in: Vec<StockInEntry>,
    stock_out: Vec<StockOutEntry>,
    last_product_id: i64,
    last_stock_in_id: i64,
    last_stock_out_id: i64,
}

impl State {
    fn product_mut(&mut self, product_id: ProductId) -> Result<&mut Product, StoreError> {
        self.products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))
    }

    fn append_stock_in(
        &mut self,
        product_id: ProductId,
        quantity: i64,
        operator_id: &OperatorId,
        at: DateTime<Utc>,
    ) -> StockInEntry {
        self.last_stock_in_id += 1;
        let entry = StockInEntry {
            id: EntryId::new(self.last_stock_in_id),
            product_id,
            original_quantity: quantity,
            quantity,
            operator_id: operator_id.clone(),
            created_at: at,
        };
        self.stock_in.push(entry.clone());
        entry
    }

    fn record_stock_out(
        &mut self,
        product_id: ProductId,
        stock_in_id: EntryId,
        quantity: i64,
        operator_id: &OperatorId,
        at: DateTime<Utc>,
    ) -> StockOutEntry {
        self.last_stock_out_id += 1;
        let entry = StockOutEntry {
            id: EntryId::new(self.last_stock_out_id),
            product_id,
            quantity,
            stock_in_id,
            operator_id: operator_id.clone(),
            created_at: at,
        };
        self.stock_out.push(entry.clone());
        entry
    }

    /// Σ original stock-in of `product_id`; `None` once it leaves `i64`.
    fn total_in(&self, product_id: ProductId) -> Option<i64> {
        self.stock_in
            .iter()
            .filter(|e| e.product_id == product_id)
            .try_fold(0i64, |acc, e| acc.checked_add(e.original_quantity))
    }

    fn total_out(&self, product_id: ProductId) -> Option<i64> {
        self.stock_out
            .iter()
            .filter(|e| e.product_id == product_id)
            .try_fold(0i64, |acc, e| acc.checked_add(e.quantity))
    }

    fn stock_in_sorted(&self, product_id: ProductId, open_only: bool) -> Vec<StockInEntry> {
        let mut entries: Vec<StockInEntry> = self
            .stock_in
            .iter()
            .filter(|e| e.product_id == product_id && (!open_only || e.is_open()))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.fifo_key());
        entries
    }
}

/// In-memory inventory store.
///
/// Intended for tests/dev. A single write lock makes every operation atomic.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn create_product(
        &self,
        cmd: &NewProduct,
    ) -> Result<(Product, Option<StockInEntry>), StoreError> {
        let mut state = self.write()?;
        state.last_product_id += 1;
        let id = ProductId::new(state.last_product_id);

        let product = Product::restore(
            id,
            cmd.details.clone(),
            cmd.initial_quantity,
            cmd.operator_id.clone(),
            cmd.occurred_at,
        );
        state.products.insert(id, product.clone());

        let opening = (cmd.initial_quantity > 0).then(|| {
            state.append_stock_in(id, cmd.initial_quantity, &cmd.operator_id, cmd.occurred_at)
        });

        Ok((product, opening))
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.products.get(&product_id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.read()?.products.values().cloned().collect())
    }

    async fn update_product_details(
        &self,
        product_id: ProductId,
        details: &ProductDetails,
    ) -> Result<Product, StoreError> {
        let mut state = self.write()?;
        let product = state.product_mut(product_id)?;
        product
            .apply_details(details.clone())
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(product.clone())
    }

    async fn record_stock_in(&self, cmd: &ReceiveStock) -> Result<StockInEntry, StoreError> {
        let mut state = self.write()?;
        state.product_mut(cmd.product_id)?;
        if state
            .total_in(cmd.product_id)
            .and_then(|total| total.checked_add(cmd.quantity))
            .is_none()
        {
            return Err(StoreError::Rejected(format!(
                "receiving {} would overflow the stock-in total of product {}",
                cmd.quantity, cmd.product_id
            )));
        }
        state
            .product_mut(cmd.product_id)?
            .apply_stock_delta(cmd.quantity)
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        Ok(state.append_stock_in(cmd.product_id, cmd.quantity, &cmd.operator_id, cmd.occurred_at))
    }

    async fn list_open_stock_in(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockInEntry>, StoreError> {
        Ok(self.read()?.stock_in_sorted(product_id, true))
    }

    async fn commit_consumption(
        &self,
        plan: &ConsumptionPlan,
        operator_id: &OperatorId,
        at: DateTime<Utc>,
    ) -> Result<Vec<StockOutEntry>, StoreError> {
        let product_id = plan.product_id();
        let mut state = self.write()?;

        let live = state.product_mut(product_id)?.quantity();
        if live < plan.consumed() {
            return Err(StoreError::Corrupt(format!(
                "stock counter {live} below planned consumption {}",
                plan.consumed()
            )));
        }

        // Validate every step before mutating anything.
        let mut positions = Vec::with_capacity(plan.steps().len());
        for step in plan.steps() {
            let pos = state
                .stock_in
                .iter()
                .position(|e| e.id == step.stock_in_id && e.product_id == product_id)
                .ok_or_else(|| {
                    StoreError::Conflict(format!("stock-in {} disappeared", step.stock_in_id))
                })?;
            let current = state.stock_in[pos].quantity;
            if current != step.remaining_before {
                return Err(StoreError::Conflict(format!(
                    "stock-in {} holds {current}, plan expected {}",
                    step.stock_in_id, step.remaining_before
                )));
            }
            positions.push(pos);
        }

        let mut stock_out = Vec::with_capacity(plan.steps().len());
        for (step, pos) in plan.steps().iter().zip(positions) {
            state.stock_in[pos].quantity -= step.take;
            stock_out.push(state.record_stock_out(
                product_id,
                step.stock_in_id,
                step.take,
                operator_id,
                at,
            ));
        }

        state
            .product_mut(product_id)?
            .apply_stock_delta(-plan.consumed())
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(stock_out)
    }

    async fn sum_stock_in(&self, product_id: ProductId) -> Result<i64, StoreError> {
        self.read()?
            .total_in(product_id)
            .ok_or_else(|| StoreError::Corrupt(format!("stock-in total of {product_id} overflows")))
    }

    async fn sum_stock_out(&self, product_id: ProductId) -> Result<i64, StoreError> {
        self.read()?
            .total_out(product_id)
            .ok_or_else(|| StoreError::Corrupt(format!("stock-out total of {product_id} overflows")))
    }

    async fn list_stock_in(&self, product_id: ProductId) -> Result<Vec<StockInEntry>, StoreError> {
        Ok(self.read()?.stock_in_sorted(product_id, false))
    }

    async fn list_stock_out(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockOutEntry>, StoreError> {
        Ok(self
            .read()?
            .stock_out
            .iter()
            .filter(|e| e.product_id == product_id)
            .cloned()
            .collect())
    }
}
