use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, OperatorId, ProductId};

/// Display attributes of a product. Everything except stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub brand: String,
    pub category: String,
    /// Price in smallest currency unit.
    pub price: i64,
}

impl ProductDetails {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if self.brand.trim().is_empty() {
            return Err(DomainError::validation("brand name cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if self.price < 0 {
            return Err(DomainError::validation("price cannot be negative"));
        }
        Ok(())
    }
}

/// A catalog product together with its cached stock counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    details: ProductDetails,
    quantity: i64,
    created_by: OperatorId,
    created_at: DateTime<Utc>,
}

impl Product {
    /// Rebuild a product from persisted state.
    pub fn restore(
        id: ProductId,
        details: ProductDetails,
        quantity: i64,
        created_by: OperatorId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            details,
            quantity,
            created_by,
            created_at,
        }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn details(&self) -> &ProductDetails {
        &self.details
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn brand(&self) -> &str {
        &self.details.brand
    }

    pub fn category(&self) -> &str {
        &self.details.category
    }

    pub fn price(&self) -> i64 {
        self.details.price
    }

    /// Live stock counter.
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn created_by(&self) -> &OperatorId {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn in_stock(&self) -> bool {
        self.quantity > 0
    }

    /// Replace display attributes. The stock counter is left untouched.
    pub fn apply_details(&mut self, details: ProductDetails) -> DomainResult<()> {
        details.validate()?;
        self.details = details;
        Ok(())
    }

    /// Move the stock counter by `delta`.
    ///
    /// Only ledger writers call this, always alongside the entry that
    /// explains the delta.
    pub fn apply_stock_delta(&mut self, delta: i64) -> DomainResult<()> {
        let next = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| DomainError::invariant("stock counter overflow"))?;
        if next < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        self.quantity = next;
        Ok(())
    }
}

/// Command: define a new product, optionally with opening stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub details: ProductDetails,
    pub initial_quantity: i64,
    pub operator_id: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

impl NewProduct {
    pub fn validate(&self) -> DomainResult<()> {
        self.details.validate()?;
        if self.initial_quantity < 0 {
            return Err(DomainError::validation("initial quantity cannot be negative"));
        }
        Ok(())
    }
}

/// Command: edit a product.
///
/// `quantity` is a requested stock *target*; it is never written directly but
/// turned into a compensating ledger movement by the inventory engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditProduct {
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub quantity: Option<i64>,
    pub operator_id: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

impl EditProduct {
    pub fn validate(&self) -> DomainResult<()> {
        self.details.validate()?;
        if matches!(self.quantity, Some(q) if q < 0) {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> ProductDetails {
        ProductDetails {
            name: "Arabica 1kg".to_string(),
            brand: "Kopi Kita".to_string(),
            category: "coffee".to_string(),
            price: 125_000,
        }
    }

    fn product(quantity: i64) -> Product {
        Product::restore(
            ProductId::new(1),
            details(),
            quantity,
            OperatorId::parse("op-1").unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn details_reject_blank_fields() {
        let mut d = details();
        d.name = "   ".to_string();
        assert!(matches!(d.validate(), Err(DomainError::Validation(_))));

        let mut d = details();
        d.category = String::new();
        assert!(matches!(d.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn details_reject_negative_price() {
        let mut d = details();
        d.price = -1;
        assert!(matches!(d.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn new_product_rejects_negative_opening_stock() {
        let cmd = NewProduct {
            details: details(),
            initial_quantity: -5,
            operator_id: OperatorId::parse("op-1").unwrap(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(cmd.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn apply_details_keeps_quantity() {
        let mut p = product(12);
        let mut d = details();
        d.price = 99;
        p.apply_details(d).unwrap();
        assert_eq!(p.price(), 99);
        assert_eq!(p.quantity(), 12);
    }

    #[test]
    fn stock_delta_cannot_go_negative() {
        let mut p = product(3);
        let err = p.apply_stock_delta(-4).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(p.quantity(), 3);

        p.apply_stock_delta(-3).unwrap();
        assert!(!p.in_stock());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 128,
                ..ProptestConfig::default()
            })]

            /// Property: applying any sequence of deltas never leaves the
            /// counter negative; rejected deltas leave it unchanged.
            #[test]
            fn counter_never_negative(deltas in prop::collection::vec(-50i64..50i64, 0..40)) {
                let mut p = product(0);
                for d in deltas {
                    let before = p.quantity();
                    match p.apply_stock_delta(d) {
                        Ok(()) => prop_assert_eq!(p.quantity(), before + d),
                        Err(_) => prop_assert_eq!(p.quantity(), before),
                    }
                    prop_assert!(p.quantity() >= 0);
                }
            }
        }
    }
}
