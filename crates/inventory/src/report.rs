//! Derived, read-only views over the ledger.

use serde::{Deserialize, Serialize};

use stockledger_core::ProductId;
use stockledger_products::Product;

use crate::entry::{StockInEntry, StockOutEntry};

/// Full movement history of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerHistory {
    pub product_id: ProductId,
    pub stock_in: Vec<StockInEntry>,
    pub stock_out: Vec<StockOutEntry>,
}

/// Audit report for one product.
///
/// `first_in_stock` sums the *original* quantity of every stock-in batch,
/// drained ones included; `first_out_stock` sums every stock-out step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReport {
    pub product_name: String,
    pub product_id: String,
    pub category: String,
    pub brand_name: String,
    pub initial_stock: i64,
    pub first_in_stock: i64,
    pub first_out_stock: i64,
    pub stock_availability: i64,
}

impl StockReport {
    pub fn build(product: &Product, total_in: i64, total_out: i64) -> Self {
        Self {
            product_name: product.name().to_string(),
            product_id: product.id().to_string(),
            category: product.category().to_string(),
            brand_name: product.brand().to_string(),
            initial_stock: product.quantity(),
            first_in_stock: total_in,
            first_out_stock: total_out,
            stock_availability: product.quantity(),
        }
    }
}

/// Counter-vs-ledger comparison for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub product_id: ProductId,
    /// Σ stock-in original − Σ stock-out.
    pub ledger_quantity: i64,
    /// Cached counter on the product row.
    pub live_quantity: i64,
    /// Σ remainder of open stock-in batches.
    pub open_batch_quantity: i64,
}

impl Reconciliation {
    pub fn new(
        product: &Product,
        total_in: i64,
        total_out: i64,
        open_batch_quantity: i64,
    ) -> Self {
        Self {
            product_id: product.id(),
            ledger_quantity: total_in.saturating_sub(total_out),
            live_quantity: product.quantity(),
            open_batch_quantity,
        }
    }

    /// Positive when the counter claims more stock than the ledger explains.
    pub fn drift(&self) -> i64 {
        self.live_quantity.saturating_sub(self.ledger_quantity)
    }

    pub fn is_consistent(&self) -> bool {
        self.ledger_quantity == self.live_quantity
            && self.ledger_quantity == self.open_batch_quantity
    }
}
