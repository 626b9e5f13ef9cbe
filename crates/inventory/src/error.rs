//! Inventory error taxonomy.

use thiserror::Error;

use stockledger_core::{DomainError, ProductId};

/// Failure of a ledger operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// Rejected before touching the ledger (non-positive quantity, bad fields).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// No open stock-in entries exist for the product.
    #[error("no stock available for product {0}")]
    OutOfStock(ProductId),

    /// Fewer units were available than requested. `consumed` units did ship.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, consumed {consumed}"
    )]
    PartialFulfillment {
        product_id: ProductId,
        requested: i64,
        consumed: i64,
    },

    /// The ledger moved underneath a consumption and retries were exhausted.
    #[error("concurrent modification: {0}")]
    Conflict(String),

    /// Storage failed or timed out. Retryable by the caller.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl StockError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Conflict(_))
    }

    /// Units left unshipped, for partial fulfillment.
    pub fn shortfall(&self) -> Option<i64> {
        match self {
            Self::PartialFulfillment {
                requested,
                consumed,
                ..
            } => Some(requested - consumed),
            _ => None,
        }
    }
}

impl From<DomainError> for StockError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::InvalidInput(msg),
            DomainError::InvariantViolation(msg) => Self::Conflict(msg),
        }
    }
}
