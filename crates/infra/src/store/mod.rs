//! Ledger entry store boundary.
//!
//! This module defines the persistence contract of the stock ledger without
//! making storage assumptions. Implementations keep two rules:
//!
//! - every write to a product's quantity happens in the same atomic write as
//!   the ledger entry explaining it;
//! - a committed consumption plan is all-or-nothing and is rejected with
//!   [`StoreError::Conflict`] when any batch no longer holds the remainder the
//!   plan was computed from.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stockledger_core::{OperatorId, ProductId};
use stockledger_inventory::{
    ConsumptionPlan, ReceiveStock, StockError, StockInEntry, StockOutEntry,
};
use stockledger_products::{NewProduct, Product, ProductDetails};

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;

/// Store operation error.
///
/// These are infrastructure errors as opposed to domain errors (validation,
/// out of stock).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend unreachable, timed out or failed mid-operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Optimistic check failed; the caller may re-read and retry.
    #[error("stale ledger state: {0}")]
    Conflict(String),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The write is valid in shape but the ledger cannot absorb it, e.g. a
    /// receipt that would overflow the counter or the stock-in total.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// Persisted state violates a ledger invariant.
    #[error("corrupt ledger state: {0}")]
    Corrupt(String),
}

impl From<StoreError> for StockError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(msg) => StockError::StorageUnavailable(msg),
            StoreError::Conflict(msg) => StockError::Conflict(msg),
            StoreError::ProductNotFound(id) => StockError::ProductNotFound(id),
            StoreError::Rejected(msg) => StockError::InvalidInput(msg),
            StoreError::Corrupt(msg) => StockError::StorageUnavailable(msg),
        }
    }
}

/// Persistence contract for products and their stock ledger.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Insert a product; a positive opening quantity is recorded as its
    /// first stock-in batch in the same write.
    async fn create_product(
        &self,
        cmd: &NewProduct,
    ) -> Result<(Product, Option<StockInEntry>), StoreError>;

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError>;

    /// All products, ordered by id.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Replace display attributes. Never touches quantity.
    async fn update_product_details(
        &self,
        product_id: ProductId,
        details: &ProductDetails,
    ) -> Result<Product, StoreError>;

    /// Append a stock-in batch and raise the counter by its quantity.
    ///
    /// Fails with [`StoreError::Rejected`] when the counter or Σ stock-in
    /// would leave the `i64` range.
    async fn record_stock_in(&self, cmd: &ReceiveStock) -> Result<StockInEntry, StoreError>;

    /// Batches with `quantity > 0`, ascending by `(created_at, id)`.
    async fn list_open_stock_in(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockInEntry>, StoreError>;

    /// Drain the planned batches, append one stock-out per step and lower the
    /// counter by the consumed total, atomically.
    async fn commit_consumption(
        &self,
        plan: &ConsumptionPlan,
        operator_id: &OperatorId,
        at: DateTime<Utc>,
    ) -> Result<Vec<StockOutEntry>, StoreError>;

    /// Σ original quantity over every stock-in batch, drained ones included.
    /// A total outside `i64` is reported as [`StoreError::Corrupt`].
    async fn sum_stock_in(&self, product_id: ProductId) -> Result<i64, StoreError>;

    /// Σ quantity over every stock-out entry.
    async fn sum_stock_out(&self, product_id: ProductId) -> Result<i64, StoreError>;

    /// Full stock-in history, ascending by `(created_at, id)`.
    async fn list_stock_in(&self, product_id: ProductId) -> Result<Vec<StockInEntry>, StoreError>;

    /// Full stock-out history in insertion order.
    async fn list_stock_out(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockOutEntry>, StoreError>;
}
