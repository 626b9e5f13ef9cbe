//! FIFO consumption planning.
//!
//! Planning is pure: given the open batches of a product and a requested
//! quantity it decides which batches to drain and by how much. Storage
//! adapters commit a plan atomically and reject it if any batch no longer
//! holds `remaining_before` units.

use serde::{Deserialize, Serialize};

use stockledger_core::{EntryId, ProductId};

use crate::entry::{StockInEntry, StockOutEntry};
use crate::error::StockError;

/// Drain `take` units from one batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionStep {
    pub stock_in_id: EntryId,
    /// Remainder the plan was computed against (optimistic check).
    pub remaining_before: i64,
    pub take: i64,
}

impl ConsumptionStep {
    pub fn remaining_after(&self) -> i64 {
        self.remaining_before - self.take
    }
}

/// Ordered list of FIFO steps for one consumption request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionPlan {
    product_id: ProductId,
    requested: i64,
    steps: Vec<ConsumptionStep>,
}

impl ConsumptionPlan {
    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn requested(&self) -> i64 {
        self.requested
    }

    pub fn steps(&self) -> &[ConsumptionStep] {
        &self.steps
    }

    /// Units the plan actually takes.
    pub fn consumed(&self) -> i64 {
        self.steps.iter().map(|s| s.take).sum()
    }

    pub fn shortfall(&self) -> i64 {
        self.requested - self.consumed()
    }

    pub fn is_partial(&self) -> bool {
        self.shortfall() > 0
    }
}

/// Plan a FIFO consumption of `requested` units.
///
/// Batches are walked oldest first (`created_at`, then entry id). Each step
/// takes `min(batch remainder, still requested)`. When every open batch is
/// exhausted before the request is met the plan is partial: it carries the
/// units that can ship and `shortfall()` reports the rest.
pub fn plan_consumption(
    product_id: ProductId,
    open_entries: &[StockInEntry],
    requested: i64,
) -> Result<ConsumptionPlan, StockError> {
    if requested <= 0 {
        return Err(StockError::invalid_input(format!(
            "quantity must be positive, got {requested}"
        )));
    }

    let mut batches: Vec<&StockInEntry> = open_entries
        .iter()
        .filter(|e| e.product_id == product_id && e.is_open())
        .collect();

    if batches.is_empty() {
        return Err(StockError::OutOfStock(product_id));
    }

    batches.sort_by_key(|e| e.fifo_key());

    let mut remaining = requested;
    let mut steps = Vec::new();
    for entry in batches {
        if remaining <= 0 {
            break;
        }
        let take = entry.quantity.min(remaining);
        steps.push(ConsumptionStep {
            stock_in_id: entry.id,
            remaining_before: entry.quantity,
            take,
        });
        remaining -= take;
    }

    Ok(ConsumptionPlan {
        product_id,
        requested,
        steps,
    })
}

/// Outcome of a committed consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consumption {
    pub product_id: ProductId,
    pub requested: i64,
    /// One entry per FIFO step, in consumption order.
    pub stock_out: Vec<StockOutEntry>,
}

impl Consumption {
    pub fn consumed(&self) -> i64 {
        self.stock_out.iter().map(|e| e.quantity).sum()
    }

    pub fn shortfall(&self) -> i64 {
        self.requested - self.consumed()
    }

    pub fn is_partial(&self) -> bool {
        self.shortfall() > 0
    }

    /// Turn a short consumption into `PartialFulfillment`.
    ///
    /// The consumed units stay committed either way; this only decides how
    /// the outcome is reported.
    pub fn into_full(self) -> Result<Self, StockError> {
        if self.is_partial() {
            return Err(StockError::PartialFulfillment {
                product_id: self.product_id,
                requested: self.requested,
                consumed: self.consumed(),
            });
        }
        Ok(self)
    }
}
