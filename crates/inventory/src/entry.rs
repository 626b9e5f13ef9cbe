use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{EntryId, OperatorId, ProductId};

/// One inbound batch.
///
/// `quantity` is the unconsumed remainder and only ever decreases;
/// `original_quantity` is what was received and never changes. Fully drained
/// batches stay around with `quantity == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockInEntry {
    pub id: EntryId,
    pub product_id: ProductId,
    pub original_quantity: i64,
    pub quantity: i64,
    pub operator_id: OperatorId,
    pub created_at: DateTime<Utc>,
}

impl StockInEntry {
    /// An open entry still has stock left to consume.
    pub fn is_open(&self) -> bool {
        self.quantity > 0
    }

    /// FIFO key: oldest first, insertion order on equal timestamps.
    pub fn fifo_key(&self) -> (DateTime<Utc>, EntryId) {
        (self.created_at, self.id)
    }
}

/// One outbound movement, i.e. one FIFO step. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockOutEntry {
    pub id: EntryId,
    pub product_id: ProductId,
    /// Units actually taken from `stock_in_id` in this step.
    pub quantity: i64,
    pub stock_in_id: EntryId,
    pub operator_id: OperatorId,
    pub created_at: DateTime<Utc>,
}
