use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use userhub_auth::{Principal, RequiredRoles, TokenMaker, authorize};

use crate::app::errors::ApiError;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<dyn TokenMaker>,
}

/// Verify the bearer token and attach the [`Principal`] to the request.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let verified = {
        let token = extract_bearer(req.headers())?;
        state.tokens.verify_token(token)
    };

    let payload = verified.map_err(|err| {
        debug!(error = %err, expired = err.is_expired(), "token rejected");
        ApiError::from(err)
    })?;

    req.extensions_mut().insert(Principal::from(payload));
    Ok(next.run(req).await)
}

/// Static role requirement for a group of routes.
#[derive(Clone)]
pub struct RoleGate {
    required: Arc<RequiredRoles>,
}

impl RoleGate {
    pub fn new(required: RequiredRoles) -> Self {
        Self {
            required: Arc::new(required),
        }
    }
}

/// Admit the request iff the principal holds one of the gate's roles.
///
/// Must run after [`auth_middleware`].
pub async fn require_roles(
    State(gate): State<RoleGate>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    {
        let principal = req
            .extensions()
            .get::<Principal>()
            .ok_or_else(ApiError::unauthenticated)?;

        authorize(principal.roles(), &gate.required).map_err(|err| {
            debug!(subject = principal.subject(), error = %err, "role check failed");
            ApiError::forbidden()
        })?;
    }

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(ApiError::missing_token)?;

    let header = header.to_str().map_err(|_| ApiError::malformed_header())?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or_else(ApiError::malformed_header)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(ApiError::malformed_header());
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, StatusCode, header::AUTHORIZATION};

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn rejects_missing_or_malformed_headers() {
        let missing = extract_bearer(&HeaderMap::new()).unwrap_err();
        assert_eq!(missing.code, "missing_token");

        for value in ["Basic dXNlcjpwdw==", "Bearer", "Bearer    ", "bearer abc"] {
            let err = extract_bearer(&headers(value)).unwrap_err();
            assert_eq!(err.status, StatusCode::UNAUTHORIZED, "{value}");
        }
    }
}
