use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Full administrative access (user management).
pub const ADMIN: &str = "Admin";
/// May create and change resources.
pub const MODIFIER: &str = "Modifier";
/// Read-only access.
pub const WATCHER: &str = "Watcher";

/// Role identifier used for RBAC.
///
/// Roles are opaque, case-sensitive strings. The user store owns the
/// user-to-role relation; this layer only sees the flattened names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Role {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}
