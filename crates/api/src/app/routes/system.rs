use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "operator_id": principal.operator_id().as_str(),
        "role": principal.role().as_str(),
        "permissions": principal
            .permissions()
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>(),
    }))
}
