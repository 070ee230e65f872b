use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use userhub_core::TokenId;

use crate::{AuthError, Role};

/// Claim set carried inside a signed token.
///
/// A payload is created once per issuance and never mutated. `roles` is a
/// snapshot of the principal's roles at issuance time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Random token identifier (audit/revocation only).
    pub id: TokenId,

    /// Principal identity (the user's email).
    #[serde(rename = "sub")]
    pub subject: String,

    /// Roles granted at issuance. `null` or a missing claim decodes as "no roles".
    #[serde(default, deserialize_with = "roles_or_empty")]
    pub roles: Vec<Role>,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl TokenPayload {
    /// Build a payload valid for `duration` starting at `now`.
    pub fn new(
        subject: impl Into<String>,
        roles: Vec<Role>,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, AuthError> {
        if duration <= Duration::zero() {
            return Err(AuthError::InvalidDuration);
        }
        let expires_at = now
            .checked_add_signed(duration)
            .ok_or(AuthError::InvalidDuration)?;

        Ok(Self {
            id: TokenId::new(),
            subject: subject.into(),
            roles,
            issued_at: now,
            expires_at,
        })
    }

    /// Time-independent structural check.
    pub fn validate_structure(&self) -> Result<(), AuthError> {
        if self.expires_at <= self.issued_at {
            return Err(AuthError::invalid("expires_at is not after issued_at"));
        }
        Ok(())
    }

    /// Whether the token is still current at `now` (inclusive of `expires_at`).
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

fn roles_or_empty<'de, D>(deserializer: D) -> Result<Vec<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Role>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_issued_at_plus_duration() {
        let now = Utc::now();
        let payload =
            TokenPayload::new("ada@x.com", vec![Role::new("Admin")], Duration::hours(12), now)
                .unwrap();
        assert_eq!(payload.issued_at, now);
        assert_eq!(payload.expires_at, now + Duration::hours(12));
        assert!(payload.validate_structure().is_ok());
    }

    #[test]
    fn non_positive_durations_are_rejected() {
        let now = Utc::now();
        assert_eq!(
            TokenPayload::new("a", vec![], Duration::zero(), now),
            Err(AuthError::InvalidDuration)
        );
        assert_eq!(
            TokenPayload::new("a", vec![], Duration::seconds(-5), now),
            Err(AuthError::InvalidDuration)
        );
    }

    #[test]
    fn current_until_and_including_expiry() {
        let now = Utc::now();
        let payload = TokenPayload::new("a", vec![], Duration::minutes(1), now).unwrap();
        assert!(payload.is_current(now));
        assert!(payload.is_current(payload.expires_at));
        assert!(!payload.is_current(payload.expires_at + Duration::nanoseconds(1)));
    }

    #[test]
    fn null_roles_decode_as_empty() {
        let json = r#"{
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "sub": "ada@x.com",
            "roles": null,
            "issued_at": "2024-01-01T00:00:00Z",
            "expires_at": "2024-01-01T12:00:00Z"
        }"#;
        let payload: TokenPayload = serde_json::from_str(json).unwrap();
        assert!(payload.roles.is_empty());
        assert_eq!(payload.subject, "ada@x.com");
    }

    #[test]
    fn wire_names_are_stable() {
        let payload =
            TokenPayload::new("ada@x.com", vec![Role::new("Watcher")], Duration::hours(1), Utc::now())
                .unwrap();
        let value = serde_json::to_value(&payload).unwrap();
        for key in ["id", "sub", "roles", "issued_at", "expires_at"] {
            assert!(value.get(key).is_some(), "missing claim {key}");
        }
        assert_eq!(value["roles"][0], "Watcher");
    }
}
