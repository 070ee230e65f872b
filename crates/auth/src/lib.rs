//! `userhub-auth`: token issuance/verification and request-time role checks.
//!
//! This crate is intentionally decoupled from HTTP and storage: the API layer
//! extracts the bearer token and maps these errors to status codes.

pub mod authorize;
pub mod claims;
pub mod error;
pub mod maker;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, RequiredRoles, authorize};
pub use claims::TokenPayload;
pub use error::AuthError;
pub use maker::{JwtTokenMaker, MIN_SECRET_KEY_SIZE, TokenMaker};
pub use principal::Principal;
pub use roles::Role;
