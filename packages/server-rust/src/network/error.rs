//! HTTP rendering of pipeline errors.
//!
//! Bodies carry only a generic message. Tenant ids, entity names and
//! internal causes stay in the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::scope::IsolationError;
use crate::service::OperationError;

/// Error type returned by every handler and boundary middleware.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Operation(#[from] OperationError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("admin token missing or wrong")]
    Unauthorized,
}

impl From<IsolationError> for ApiError {
    fn from(err: IsolationError) -> Self {
        Self::Operation(OperationError::Isolation(err))
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Operation(OperationError::Isolation(err)) if err.is_unauthenticated() => {
                StatusCode::UNAUTHORIZED
            }
            Self::Operation(OperationError::Isolation(_)) => StatusCode::FORBIDDEN,
            Self::Operation(OperationError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Operation(OperationError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    fn public_message(&self) -> &str {
        match self {
            Self::Operation(OperationError::Isolation(err)) => err.public_message(),
            Self::Operation(OperationError::Timeout { .. }) => "operation timed out",
            Self::Operation(OperationError::Internal(_)) => "internal error",
            Self::BadRequest(reason) => reason,
            Self::Unauthorized => "authentication required",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Operation(OperationError::Internal(cause)) = &self {
            error!(error = %cause, "request failed");
        }
        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (ApiError::from(IsolationError::MissingTenantContext), StatusCode::UNAUTHORIZED),
            (
                ApiError::from(IsolationError::UnauthenticatedNoTenantClaim),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::from(IsolationError::TenantMismatchOnWrite {
                    entity: "client".into(),
                }),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::from(IsolationError::UnregisteredEntity {
                    entity: "x".into(),
                }),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::from(IsolationError::InvalidTenantIdentifier),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::Operation(OperationError::Timeout { timeout_ms: 5 }),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ApiError::Operation(OperationError::Internal(anyhow::anyhow!("boom"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[test]
    fn forbidden_body_is_generic() {
        let err = ApiError::from(IsolationError::TenantMismatchOnModify {
            entity: "payment".into(),
        });
        assert_eq!(err.public_message(), "access denied");
    }
}
