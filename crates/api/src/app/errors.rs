use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockledger_inventory::StockError;

pub fn stock_error_to_response(err: StockError) -> axum::response::Response {
    match err {
        StockError::InvalidInput(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_input", msg),
        StockError::ProductNotFound(id) => json_error(
            StatusCode::NOT_FOUND,
            "product_not_found",
            format!("product {id} not found"),
        ),
        StockError::OutOfStock(id) => json_error(
            StatusCode::NOT_FOUND,
            "out_of_stock",
            format!("no stock available for product {id}"),
        ),
        StockError::PartialFulfillment {
            product_id,
            requested,
            consumed,
        } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": format!(
                    "insufficient stock for product {product_id}: requested {requested}, consumed {consumed}"
                ),
                "consumed": consumed,
                "shortfall": requested - consumed,
            })),
        )
            .into_response(),
        StockError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StockError::StorageUnavailable(msg) => {
            tracing::error!(error = %msg, "storage failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_unavailable",
                "storage unavailable, retry later",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
