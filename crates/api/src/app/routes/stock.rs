use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use stockledger_auth::Permission;
use stockledger_core::ProductId;
use stockledger_inventory::{Consumption, DispenseStock, ReceiveStock};

use crate::app::routes::products::parse_product_id;
use crate::app::{Ledger, dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

fn movement_body(
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> Result<dto::StockMovementRequest, axum::response::Response> {
    body.map(|Json(b)| b)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_input", e.body_text()))
}

pub async fn stock_in(
    Extension(ledger): Extension<Arc<Ledger>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, Permission::STOCK_RECEIVE) {
        return denied;
    }
    let body = match movement_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let cmd = ReceiveStock {
        product_id: ProductId::new(body.product_id),
        quantity: body.quantity,
        operator_id: principal.operator_id().clone(),
        occurred_at: Utc::now(),
    };

    match ledger.receive(cmd).await {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(e) => errors::stock_error_to_response(e),
    }
}

/// Dispense stock FIFO. A shortfall answers 409 with the units that did ship.
pub async fn stock_out(
    Extension(ledger): Extension<Arc<Ledger>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, Permission::STOCK_DISPENSE) {
        return denied;
    }
    let body = match movement_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let cmd = DispenseStock {
        product_id: ProductId::new(body.product_id),
        quantity: body.quantity,
        operator_id: principal.operator_id().clone(),
        occurred_at: Utc::now(),
    };

    match ledger.consume(cmd).await.and_then(Consumption::into_full) {
        Ok(consumption) => Json(json!({
            "message": "stock dispensed",
            "consumed": consumption.consumed(),
        }))
        .into_response(),
        Err(e) => errors::stock_error_to_response(e),
    }
}

pub async fn ledger_history(
    Extension(ledger): Extension<Arc<Ledger>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, Permission::LEDGER_READ) {
        return denied;
    }
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match ledger.ledger_history(product_id).await {
        Ok(history) => Json(history).into_response(),
        Err(e) => errors::stock_error_to_response(e),
    }
}
