use axum::{
    Router,
    routing::{get, post, put},
};

pub mod products;
pub mod reports;
pub mod stock;
pub mod system;

/// Read-only catalog for authenticated customers.
pub fn user_router() -> Router {
    Router::new()
        .route("/products", get(products::list_products))
        .route("/whoami", get(system::whoami))
}

/// Warehouse operators: catalog maintenance and stock movements.
pub fn operator_router() -> Router {
    Router::new()
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route("/products/:id", put(products::edit_product))
        .route("/products/:id/ledger", get(stock::ledger_history))
        .route("/stock-in", post(stock::stock_in))
        .route("/stock-out", post(stock::stock_out))
        .route("/whoami", get(system::whoami))
}

/// Administrators: audit views.
pub fn admin_router() -> Router {
    Router::new()
        .route("/products", get(products::list_products))
        .route("/products/:id/report", get(reports::stock_report))
        .route("/products/:id/reconciliation", get(reports::reconciliation))
        .route("/whoami", get(system::whoami))
}
