use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use userhub_auth::AuthError;

use crate::usecases::UserServiceError;

/// Error response with a stable machine-readable code and a safe message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn missing_token() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "missing_token",
            "authorization header is missing",
        )
    }

    pub fn malformed_header() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "invalid_authorization_header",
            "expected 'Authorization: Bearer <token>'",
        )
    }

    pub fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", "authentication required")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", "insufficient role")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_error(self.status, self.code, self.message)
    }
}

/// Token verification failures; details stay in the logs.
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ExpiredToken => {
                Self::new(StatusCode::UNAUTHORIZED, "token_expired", "token has expired")
            }
            AuthError::InvalidToken(_) => {
                Self::new(StatusCode::UNAUTHORIZED, "invalid_token", "token is invalid")
            }
            other => {
                error!(error = %other, "token operation failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "token_error",
                    "failed to process token",
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_body", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), "invalid_path", rejection.body_text())
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::Validation(msg) => {
                Self::new(StatusCode::BAD_REQUEST, "validation_error", msg)
            }
            UserServiceError::AlreadyRegistered(_) => {
                Self::new(StatusCode::CONFLICT, "conflict", "email is already registered")
            }
            UserServiceError::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "not_found", "user not found")
            }
            UserServiceError::InvalidCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, "invalid_credentials", "Invalid credentials")
            }
            UserServiceError::Publish(_) => Self::new(
                StatusCode::BAD_GATEWAY,
                "publish_error",
                "user was created but the user.created event could not be published",
            ),
            UserServiceError::Token(err) => err.into(),
            UserServiceError::Store(err) => {
                error!(error = %err, "user store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal error")
            }
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
