//! Error types for the Folio server

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::db::CatalogError;
use crate::pdf::RenderError;
use crate::pool::PoolError;
use crate::storage::StorageError;
use crate::upload::IngestError;

/// Seconds a client should wait before retrying an overloaded request
const RETRY_AFTER_SECS: &str = "5";

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported content kind: {0}")]
    UnsupportedKind(String),

    #[error("Name already taken: {0}")]
    NameTaken(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Renderer failure: {0}")]
    RendererFailure(String),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl From<PoolError> for AppError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Busy | PoolError::Timeout(_) => AppError::Busy(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::NotFound(id) => AppError::NotFound(id),
            RenderError::SourceMissing(_) | RenderError::Renderer(_) => AppError::RendererFailure(err.to_string()),
            RenderError::Busy(e) => e.into(),
            RenderError::Storage(msg) | RenderError::Catalog(msg) => AppError::Internal(msg),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::UnsupportedKind(kind) => AppError::UnsupportedKind(kind),
            IngestError::Conflict(id) => AppError::Conflict(id),
            IngestError::Storage(e) => AppError::Storage(e),
            IngestError::Catalog(e) => AppError::Catalog(e),
            IngestError::Busy(e) => e.into(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::NameTaken(name) => AppError::NameTaken(name),
            AuthError::InvalidInput(msg) => AppError::BadRequest(msg),
            AuthError::Busy(e) => e.into(),
            AuthError::Hash(msg) => AppError::Internal(msg),
            AuthError::Catalog(e) => AppError::Catalog(e),
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", format!("Not found: {}", msg)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Authentication required".to_string(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid-credentials",
                "Invalid name or password".to_string(),
            ),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg.clone()),
            AppError::UnsupportedKind(kind) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported-kind",
                format!("Only PDF uploads are accepted, got '{}'", kind),
            ),
            AppError::NameTaken(name) => (
                StatusCode::CONFLICT,
                "name-taken",
                format!("The name '{}' is already taken", name),
            ),
            AppError::Conflict(msg) => {
                tracing::warn!("Conflict: {}", msg);
                (
                    StatusCode::CONFLICT,
                    "storage-conflict",
                    "Storage conflict, please retry".to_string(),
                )
            }
            AppError::RendererFailure(msg) => {
                tracing::error!("Renderer failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "renderer-failure",
                    "The page could not be rendered".to_string(),
                )
            }
            AppError::Busy(msg) => {
                tracing::warn!("Rejecting request, workers busy: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "retry-later",
                    "Server busy, retry later".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Storage(e) => match e {
                StorageError::NotFound(id) => (StatusCode::NOT_FOUND, "not_found", format!("Not found: {}", id)),
                StorageError::Conflict(_) => (
                    StatusCode::CONFLICT,
                    "storage-conflict",
                    "Storage conflict, please retry".to_string(),
                ),
                StorageError::Io(_) => {
                    tracing::error!("Storage error: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "storage_error",
                        "Storage error".to_string(),
                    )
                }
            },
            AppError::Catalog(e) => match e {
                CatalogError::Conflict(_) => (
                    StatusCode::CONFLICT,
                    "storage-conflict",
                    "Storage conflict, please retry".to_string(),
                ),
                CatalogError::Database(_) => {
                    tracing::error!("Database error: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "database_error",
                        "Database error".to_string(),
                    )
                }
            },
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        if status == StatusCode::SERVICE_UNAVAILABLE {
            return (status, [(header::RETRY_AFTER, RETRY_AFTER_SECS)], body).into_response();
        }
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_pool_maps_to_retry_later() {
        let response = AppError::from(PoolError::Busy).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], RETRY_AFTER_SECS);
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::from(IngestError::UnsupportedKind("image/png".into())), StatusCode::UNSUPPORTED_MEDIA_TYPE),
            (AppError::from(IngestError::Conflict("abc".into())), StatusCode::CONFLICT),
            (AppError::from(IngestError::Busy(PoolError::Busy)), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::from(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (AppError::from(RenderError::NotFound("abc".into())), StatusCode::NOT_FOUND),
            (AppError::from(RenderError::Renderer("bad page".into())), StatusCode::BAD_GATEWAY),
            (AppError::from(StorageError::NotFound("abc".into())), StatusCode::NOT_FOUND),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
