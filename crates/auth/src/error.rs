//! Error types for token operations.

use thiserror::Error;

/// Token issuance/verification failures.
///
/// `InvalidToken` and `ExpiredToken` are both authentication failures at the
/// request boundary; they stay distinct so logs can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Signing key is unusable (too short). Fatal at startup.
    #[error("invalid key size: must be at least {min} bytes, got {actual}")]
    KeyConfiguration { min: usize, actual: usize },

    /// Token lifetime must be positive and representable.
    #[error("invalid token duration")]
    InvalidDuration,

    /// Signature, structure or algorithm did not match.
    #[error("token is invalid: {0}")]
    InvalidToken(String),

    /// Structurally valid, correctly signed, but past `expires_at`.
    #[error("token has expired")]
    ExpiredToken,

    /// Signing failed (serialization of the claim set).
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl AuthError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidToken(reason.into())
    }

    /// True for failures that must surface as `401 Unauthorized`.
    #[must_use]
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, AuthError::InvalidToken(_) | AuthError::ExpiredToken)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, AuthError::ExpiredToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_configuration_message_names_the_minimum() {
        let err = AuthError::KeyConfiguration { min: 32, actual: 16 };
        assert_eq!(
            err.to_string(),
            "invalid key size: must be at least 32 bytes, got 16"
        );
        assert!(!err.is_authentication_failure());
    }

    #[test]
    fn expired_and_invalid_are_both_authentication_failures() {
        assert!(AuthError::ExpiredToken.is_authentication_failure());
        assert!(AuthError::invalid("bad signature").is_authentication_failure());
        assert!(AuthError::ExpiredToken.is_expired());
        assert!(!AuthError::invalid("bad signature").is_expired());
    }
}
