use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use stockledger_auth::Permission;
use stockledger_core::ProductId;
use stockledger_products::{EditProduct, NewProduct};

use crate::app::{Ledger, dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub async fn list_products(
    Extension(ledger): Extension<Arc<Ledger>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, Permission::PRODUCTS_READ) {
        return denied;
    }

    match ledger.list_products().await {
        Ok(products) => Json(
            products
                .iter()
                .map(dto::product_to_json)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::stock_error_to_response(e),
    }
}

pub async fn create_product(
    Extension(ledger): Extension<Arc<Ledger>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::ProductRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, Permission::PRODUCTS_WRITE) {
        return denied;
    }
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_input", e.body_text()),
    };

    let cmd = NewProduct {
        details: body.details(),
        initial_quantity: body.quantity.unwrap_or(0),
        operator_id: principal.operator_id().clone(),
        occurred_at: Utc::now(),
    };

    match ledger.create_product(cmd).await {
        Ok(product) => (StatusCode::CREATED, Json(dto::product_to_json(&product))).into_response(),
        Err(e) => errors::stock_error_to_response(e),
    }
}

pub async fn edit_product(
    Extension(ledger): Extension<Arc<Ledger>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::ProductRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, Permission::PRODUCTS_WRITE) {
        return denied;
    }
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_input", e.body_text()),
    };

    let cmd = EditProduct {
        product_id,
        details: body.details(),
        quantity: body.quantity,
        operator_id: principal.operator_id().clone(),
        occurred_at: Utc::now(),
    };

    match ledger.edit_product(cmd).await {
        Ok(product) => Json(dto::product_to_json(&product)).into_response(),
        Err(e) => errors::stock_error_to_response(e),
    }
}

pub fn parse_product_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_input",
            format!("invalid product id '{raw}'"),
        )
    })
}
