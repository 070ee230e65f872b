use axum::{Json, http::StatusCode, response::IntoResponse};

use crate::context::CurrentPrincipal;

pub async fn version() -> &'static str {
    "Version 1"
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(CurrentPrincipal(principal): CurrentPrincipal) -> impl IntoResponse {
    Json(serde_json::json!({
        "subject": principal.subject(),
        "token_id": principal.token_id(),
        "roles": principal.roles(),
        "expires_at": principal.expires_at(),
    }))
}
