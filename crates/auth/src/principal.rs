use chrono::{DateTime, Utc};
use serde::Serialize;

use userhub_core::TokenId;

use crate::{Role, TokenPayload};

/// Authenticated identity attached to a request once its token is verified.
///
/// Built only from a verified [`TokenPayload`], so holders never need to
/// re-check the shape of the role claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    token_id: TokenId,
    subject: String,
    roles: Vec<Role>,
    expires_at: DateTime<Utc>,
}

impl Principal {
    pub fn token_id(&self) -> TokenId {
        self.token_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl From<TokenPayload> for Principal {
    fn from(payload: TokenPayload) -> Self {
        Self {
            token_id: payload.id,
            subject: payload.subject,
            roles: payload.roles,
            expires_at: payload.expires_at,
        }
    }
}
