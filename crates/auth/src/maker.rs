//! Symmetric (HS256) token issuance and verification.
//!
//! Tokens are stateless: nothing is stored server-side, so an issued token
//! stays valid until it expires. There is no revocation list.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use crate::{AuthError, Role, TokenPayload};

/// Minimum accepted length of the signing secret, in bytes.
pub const MIN_SECRET_KEY_SIZE: usize = 32;

/// Issues and verifies signed tokens.
///
/// The `_at` methods take the clock explicitly; the provided methods use the
/// wall clock.
pub trait TokenMaker: Send + Sync {
    fn create_token_at(
        &self,
        subject: &str,
        roles: &[Role],
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError>;

    fn verify_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenPayload, AuthError>;

    fn create_token(
        &self,
        subject: &str,
        roles: &[Role],
        duration: Duration,
    ) -> Result<String, AuthError> {
        self.create_token_at(subject, roles, duration, Utc::now())
    }

    fn verify_token(&self, token: &str) -> Result<TokenPayload, AuthError> {
        self.verify_token_at(token, Utc::now())
    }
}

/// HS256 token maker over a process-wide, read-only secret.
#[derive(Clone)]
pub struct JwtTokenMaker {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl core::fmt::Debug for JwtTokenMaker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JwtTokenMaker").finish_non_exhaustive()
    }
}

impl JwtTokenMaker {
    /// Build a maker from the signing secret.
    ///
    /// # Errors
    ///
    /// `AuthError::KeyConfiguration` if the secret is shorter than
    /// [`MIN_SECRET_KEY_SIZE`] bytes.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, AuthError> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_KEY_SIZE {
            return Err(AuthError::KeyConfiguration {
                min: MIN_SECRET_KEY_SIZE,
                actual: secret.len(),
            });
        }

        // Expiry is checked against the caller's clock after decoding, so the
        // library's own `exp` handling is disabled.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256];
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }
}

impl TokenMaker for JwtTokenMaker {
    fn create_token_at(
        &self,
        subject: &str,
        roles: &[Role],
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let payload = TokenPayload::new(subject, roles.to_vec(), duration, now)?;
        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    fn verify_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenPayload, AuthError> {
        let data = decode::<TokenPayload>(token, &self.decoding_key, &self.validation)
            .map_err(map_jwt_error)?;
        let payload = data.claims;

        payload.validate_structure()?;

        if !payload.is_current(now) {
            debug!(token_id = %payload.id, expires_at = %payload.expires_at, "token expired");
            return Err(AuthError::ExpiredToken);
        }

        Ok(payload)
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    let reason = match err.kind() {
        ErrorKind::InvalidSignature => "signature mismatch",
        ErrorKind::InvalidAlgorithm => "unexpected signing algorithm",
        ErrorKind::InvalidToken => "malformed token",
        ErrorKind::Base64(_) => "invalid base64 encoding",
        ErrorKind::Json(_) => "invalid claim set",
        ErrorKind::Utf8(_) => "invalid utf-8 in token",
        _ => "token validation failed",
    };
    debug!(error = %err, "token rejected");
    AuthError::invalid(reason)
}
