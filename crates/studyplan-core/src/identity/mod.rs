//! Identity verification seam.
//!
//! Tokens are issued elsewhere. This service only checks them and turns a
//! valid one into a [`Principal`] that is then passed explicitly into every
//! ownership check.

pub mod jwt;

use std::fmt;

pub use jwt::JwtVerifier;

/// The verified caller. Compared against `StudyPlan::owner_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Principal(pub i64);

impl Principal {
    pub fn id(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user {}", self.0)
    }
}

/// Why a credential was refused. Every variant is a 401 at the HTTP edge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("missing bearer token")]
    Missing,

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token does not name a user")]
    NoPrincipal,

    #[error("identity verifier misconfigured: {0}")]
    Config(String),
}

/// Verifies an opaque bearer credential.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Principal, IdentityError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn IdentityVerifier) {}
};

/// Pull the token out of an `Authorization` header value.
///
/// Only the `Bearer` scheme is accepted (case-insensitive).
pub fn extract_bearer(header: Option<&str>) -> Result<&str, IdentityError> {
    let header = header.ok_or(IdentityError::Missing)?.trim();
    let (scheme, token) = header.split_once(' ').ok_or(IdentityError::Missing)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(IdentityError::Missing);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(IdentityError::Missing);
    }
    Ok(token)
}
