//! Admin-only user routes; the role gate is applied by the caller.

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use userhub_auth::Role;
use userhub_core::UserId;
use userhub_infra::{NewUser, User};

use crate::app::{errors::ApiError, services::AppServices};
use crate::context::{ApiJson, ApiPath};

pub fn router() -> Router {
    Router::new()
        .route("/user", get(list_users).post(create_user))
        .route("/user/:id", get(get_user))
        .route("/user/:id/roles/:role", post(add_role).delete(remove_role))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// POST /user
pub async fn create_user(
    Extension(services): Extension<AppServices>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = services
        .users
        .create(NewUser {
            name: req.name,
            email: req.email,
            password: req.password,
            roles: req.roles.into_iter().map(Role::from).collect(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /user
pub async fn list_users(
    Extension(services): Extension<AppServices>,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(services.users.list().await?))
}

/// GET /user/:id
pub async fn get_user(
    Extension(services): Extension<AppServices>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(services.users.get(UserId::new(id)).await?))
}

/// POST /user/:id/roles/:role
pub async fn add_role(
    Extension(services): Extension<AppServices>,
    ApiPath((id, role)): ApiPath<(u64, String)>,
) -> Result<Json<User>, ApiError> {
    let user = services
        .users
        .assign_role(UserId::new(id), Role::from(role))
        .await?;
    Ok(Json(user))
}

/// DELETE /user/:id/roles/:role
pub async fn remove_role(
    Extension(services): Extension<AppServices>,
    ApiPath((id, role)): ApiPath<(u64, String)>,
) -> Result<Json<User>, ApiError> {
    let user = services
        .users
        .remove_role(UserId::new(id), &Role::from(role))
        .await?;
    Ok(Json(user))
}
