use axum::{Extension, Json, response::IntoResponse};
use serde::Deserialize;

use crate::app::{errors::ApiError, services::AppServices};
use crate::context::{ApiJson, CurrentPrincipal};
use crate::usecases::LoginResult;

/// `username` carries the user's email.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /login
pub async fn login(
    Extension(services): Extension<AppServices>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResult>, ApiError> {
    let result = services.users.login(&req.username, &req.password).await?;
    Ok(Json(result))
}

/// GET /verify-token; reaching the handler means the token verified.
pub async fn verify_token(_principal: CurrentPrincipal) -> impl IntoResponse {
    Json(serde_json::json!({ "data": true }))
}
