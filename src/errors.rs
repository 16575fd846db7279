use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Standard error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional detail (per-field validation feedback)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Unique-constraint race on a keyed write. Callers translate this into
    /// an update-instead retry; it must never reach an API response as-is.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// A (seller, product) pair that is already distributed. Idempotent
    /// callers treat this as "already done", bulk callers as a per-item
    /// failure.
    #[error("Product already distributed: {0}")]
    DuplicateDistribution(Uuid),

    #[error("Insufficient warehouse stock: requested {requested}, warehouse has {available}")]
    InsufficientWarehouseStock { requested: i32, available: i32 },

    #[error("Insufficient available stock: requested {requested}, available {available}")]
    InsufficientAvailableStock { requested: i32, available: i32 },

    /// Real-metric computation failed for one metric. Never aborts a
    /// resolve call; the resolver degrades that metric only.
    #[error("Metric data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Whether a database error reports a violated unique constraint.
    ///
    /// SQLite and Postgres word this differently; both drivers surface the
    /// violation through `DbErr::Query` or `DbErr::Exec`, so the check is on
    /// the rendered message.
    pub fn is_unique_violation(err: &DbErr) -> bool {
        let msg = err.to_string();
        msg.contains("UNIQUE constraint failed")
            || msg.contains("duplicate key value violates unique constraint")
    }

    /// Returns the HTTP status code for this error.
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateKey(_) | Self::Conflict(_) | Self::DuplicateDistribution(_) => {
                StatusCode::CONFLICT
            }
            Self::InsufficientWarehouseStock { .. } | Self::InsufficientAvailableStock { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            // Duplicate-key races are retried internally; if one leaks this
            // far the caller sees a plain conflict.
            Self::DuplicateKey(_) => "Conflict on concurrent write".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rule_errors_map_to_unprocessable() {
        let err = ServiceError::InsufficientAvailableStock {
            requested: 5,
            available: 2,
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.response_message().contains("requested 5"));
    }

    #[test]
    fn internal_errors_hide_detail() {
        let err = ServiceError::InternalError("connection pool exhausted".into());
        assert_eq!(err.response_message(), "Internal server error");
    }

    #[test]
    fn unique_violation_detection_covers_both_backends() {
        let sqlite = DbErr::Custom("UNIQUE constraint failed: metric_overrides.seller_id".into());
        let pg = DbErr::Custom(
            "duplicate key value violates unique constraint \"idx_metric_overrides_tuple\"".into(),
        );
        assert!(ServiceError::is_unique_violation(&sqlite));
        assert!(ServiceError::is_unique_violation(&pg));
        assert!(!ServiceError::is_unique_violation(&DbErr::Custom(
            "timeout".into()
        )));
    }
}
