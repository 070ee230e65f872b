//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: use-case wiring (token maker, user store, event publisher)
//! - `routes/`: HTTP routes + handlers
//! - `errors.rs`: consistent error responses

use axum::{
    Extension, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower::ServiceBuilder;

use userhub_auth::RequiredRoles;
use userhub_auth::roles::ADMIN;

use crate::middleware::{self, AuthState, RoleGate};

pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices) -> Router {
    let auth_state = AuthState {
        tokens: services.tokens.clone(),
    };
    let admin_only = RoleGate::new(RequiredRoles::any_of([ADMIN]));

    let user_admin = routes::users::router()
        .layer(from_fn_with_state(admin_only, middleware::require_roles));

    // Protected routes: any valid token.
    let protected = Router::new()
        .route("/verify-token", get(routes::auth::verify_token))
        .route("/whoami", get(routes::system::whoami))
        .merge(user_admin)
        .layer(from_fn_with_state(auth_state, middleware::auth_middleware));

    Router::new()
        .route("/", get(routes::system::version))
        .route("/health", get(routes::system::health))
        .route("/login", post(routes::auth::login))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
