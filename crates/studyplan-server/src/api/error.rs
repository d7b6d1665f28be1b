use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use studyplan_core::identity::IdentityError;
use studyplan_core::{ErrorKind, ServiceError};

/// Every failed request ends up here. The body is always
/// `{"error": <kind>, "message": <text>}`.
#[derive(Debug)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AccessDenied => StatusCode::FORBIDDEN,
            ErrorKind::Duplicate => StatusCode::CONFLICT,
            ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Internal(e) => {
                error!("request failed: {e:#}");
                Self::new(ErrorKind::Internal, "internal server error")
            }
            other => Self::new(other.kind(), other.to_string()),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        Self::new(ErrorKind::Unauthorized, err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.kind.as_str(),
            "message": self.message,
        });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (ErrorKind::Validation, 400),
            (ErrorKind::Unauthorized, 401),
            (ErrorKind::AccessDenied, 403),
            (ErrorKind::NotFound, 404),
            (ErrorKind::Duplicate, 409),
            (ErrorKind::Internal, 500),
            (ErrorKind::UpstreamUnavailable, 503),
        ];
        for (kind, status) in cases {
            assert_eq!(AppError::new(kind, "x").status().as_u16(), status);
        }
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err: AppError = ServiceError::Internal(anyhow::anyhow!("password=hunter2")).into();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(err.message, "internal server error");
    }

    #[test]
    fn service_message_is_kept() {
        let err: AppError = ServiceError::NotFound {
            entity: "semester",
            id: 9,
        }
        .into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message, "semester 9 not found");
    }
}
