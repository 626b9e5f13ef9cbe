use serde::Deserialize;
use serde_json::json;

use stockledger_products::{Product, ProductDetails};

// -------------------------
// Request DTOs
// -------------------------

/// Body of product create and edit.
///
/// `quantity` on create is the opening stock; on edit it is the target the
/// counter is moved to through a compensating ledger movement.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub product_name: String,
    pub brand_name: String,
    #[serde(default)]
    pub category: String,
    pub price: i64,
    pub quantity: Option<i64>,
}

impl ProductRequest {
    pub fn details(&self) -> ProductDetails {
        ProductDetails {
            name: self.product_name.clone(),
            brand: self.brand_name.clone(),
            category: self.category.clone(),
            price: self.price,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovementRequest {
    pub product_id: i64,
    pub quantity: i64,
}

// -------------------------
// Response mapping
// -------------------------

pub fn product_to_json(product: &Product) -> serde_json::Value {
    json!({
        "id": product.id(),
        "productName": product.name(),
        "brandName": product.brand(),
        "category": product.category(),
        "price": product.price(),
        "quantity": product.quantity(),
        "status": product.in_stock(),
        "userId": product.created_by(),
        "createdAt": product.created_at(),
    })
}
