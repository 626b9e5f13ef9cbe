use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{OperatorId, ProductId};

use crate::error::StockError;

/// Command: ReceiveStock (append a stock-in batch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub product_id: ProductId,
    pub quantity: i64,
    pub operator_id: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

impl ReceiveStock {
    pub fn validate(&self) -> Result<(), StockError> {
        ensure_positive(self.quantity)
    }
}

/// Command: DispenseStock (consume stock FIFO).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseStock {
    pub product_id: ProductId,
    pub quantity: i64,
    pub operator_id: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

impl DispenseStock {
    pub fn validate(&self) -> Result<(), StockError> {
        ensure_positive(self.quantity)
    }
}

fn ensure_positive(quantity: i64) -> Result<(), StockError> {
    if quantity <= 0 {
        return Err(StockError::invalid_input(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    Ok(())
}
