use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    response::IntoResponse,
};
use serde_json::json;

use stockledger_auth::Permission;

use crate::app::routes::products::parse_product_id;
use crate::app::{Ledger, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub async fn stock_report(
    Extension(ledger): Extension<Arc<Ledger>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, Permission::REPORTS_READ) {
        return denied;
    }
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match ledger.build_report(product_id).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::stock_error_to_response(e),
    }
}

pub async fn reconciliation(
    Extension(ledger): Extension<Arc<Ledger>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, Permission::REPORTS_READ) {
        return denied;
    }
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match ledger.reconcile(product_id).await {
        Ok(r) => Json(json!({
            "productId": r.product_id,
            "ledgerQuantity": r.ledger_quantity,
            "liveQuantity": r.live_quantity,
            "openBatchQuantity": r.open_batch_quantity,
            "drift": r.drift(),
            "consistent": r.is_consistent(),
        }))
        .into_response(),
        Err(e) => errors::stock_error_to_response(e),
    }
}
