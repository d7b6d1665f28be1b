//! Error taxonomy shared by every service.

use std::fmt;

use crate::store::StoreError;

/// Stable, machine-readable error category. The string form is what clients
/// see in the `error` field of an error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AccessDenied,
    Duplicate,
    UpstreamUnavailable,
    Unauthorized,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::NotFound => "NotFoundError",
            Self::AccessDenied => "AccessDenied",
            Self::Duplicate => "DuplicateError",
            Self::UpstreamUnavailable => "UpstreamUnavailable",
            Self::Unauthorized => "Unauthorized",
            Self::Internal => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the plan, semester and placement services and by the
/// ownership gate.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or missing input. The message names the offending field.
    #[error("{0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0}")]
    AccessDenied(String),

    /// Valid input that breaks a uniqueness rule.
    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Duplicate(msg) => Self::Duplicate(msg),
            StoreError::Invalid(msg) => Self::Validation(msg),
            StoreError::Internal(e) => Self::Internal(e),
        }
    }
}
