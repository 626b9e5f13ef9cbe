//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the shared stock engine
//! - `routes/`: HTTP routes + handlers, one router per role group
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use stockledger_auth::{Hs256JwtValidator, JwtValidator, Role, RoleKeys};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::Ledger;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Each route group is verified with the key of the role it requires:
/// `/api` (user), `/operator` (operator), `/admin` (admin).
pub fn build_app(ledger: Arc<Ledger>, keys: RoleKeys) -> Router {
    let jwt: Arc<dyn JwtValidator> = Arc::new(Hs256JwtValidator::new(keys));

    let guarded = |router: Router, required: Role| {
        router.layer(axum::middleware::from_fn_with_state(
            middleware::AuthState {
                jwt: Arc::clone(&jwt),
                required,
            },
            middleware::auth_middleware,
        ))
    };

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", guarded(routes::user_router(), Role::User))
        .nest("/operator", guarded(routes::operator_router(), Role::Operator))
        .nest("/admin", guarded(routes::admin_router(), Role::Admin))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_id_middleware))
                .layer(Extension(ledger)),
        )
}
