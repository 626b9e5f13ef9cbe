//! API-side authorization guard.
//!
//! Route groups already pin a role; this additionally checks the permission
//! an individual handler needs before it touches the ledger.

use axum::http::StatusCode;
use axum::response::Response;

use stockledger_auth::{Permission, authorize};

use crate::app::errors;
use crate::context::PrincipalContext;

pub fn require(principal: &PrincipalContext, permission: Permission) -> Result<(), Response> {
    authorize(principal.principal(), &permission)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}
