use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::inventory::InventoryError;
use crate::services::redemption::ServiceError;
use crate::services::redemption_store::RedemptionError;
use crate::storage::StorageError;

/// API-edge error taxonomy. Business refusals from the services map onto
/// these one-to-one and surface unmutated; only storage faults collapse
/// into a generic 500.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("not found")]
    NotFound,

    #[error("not enough seats available")]
    SeatUnavailable,

    #[error("showtime is closed for booking")]
    ScheduleClosed,

    #[error("forbidden")]
    Forbidden,

    #[error("credential already used")]
    AlreadyUsed,

    #[error("credential expired")]
    Expired,

    #[error("subject is not in a redeemable status: {0}")]
    InvalidStatus(String),

    #[error("storage conflict, retry the operation")]
    StorageConflict,

    #[error("database error")]
    Database(#[from] StorageError),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable tag for the response body. Never carries
    /// inner error detail, which for storage faults would leak driver
    /// messages to clients.
    fn tag(&self) -> &'static str {
        match self {
            AppError::Unauthenticated => "unauthenticated",
            AppError::NotFound => "not_found",
            AppError::SeatUnavailable => "seat_unavailable",
            AppError::ScheduleClosed => "schedule_closed",
            AppError::Forbidden => "forbidden",
            AppError::AlreadyUsed => "already_used",
            AppError::Expired => "expired",
            AppError::InvalidStatus(_) => "invalid_status",
            AppError::StorageConflict => "storage_conflict",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let tag = self.tag();

        let (status, message) = match self {
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::SeatUnavailable
            | AppError::ScheduleClosed
            | AppError::AlreadyUsed
            | AppError::StorageConflict => (StatusCode::CONFLICT, self.to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Expired => (StatusCode::GONE, self.to_string()),
            AppError::InvalidStatus(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": tag,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<InventoryError> for AppError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::NotFound => AppError::NotFound,
            InventoryError::SeatUnavailable => AppError::SeatUnavailable,
            InventoryError::ScheduleClosed => AppError::ScheduleClosed,
            InventoryError::Conflict => AppError::StorageConflict,
            InventoryError::Storage(e) => AppError::Database(e),
        }
    }
}

impl From<RedemptionError> for AppError {
    fn from(e: RedemptionError) -> Self {
        match e {
            RedemptionError::NotFound => AppError::NotFound,
            RedemptionError::Forbidden => AppError::Forbidden,
            RedemptionError::AlreadyUsed => AppError::AlreadyUsed,
            RedemptionError::Expired => AppError::Expired,
            RedemptionError::InvalidStatus(status) => {
                AppError::InvalidStatus(status.to_string())
            }
            RedemptionError::Encoding(e) => AppError::Internal(e.into()),
            RedemptionError::Render(e) => AppError::Internal(e.into()),
            RedemptionError::Storage(e) => AppError::Database(e),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::NotFound => AppError::NotFound,
            ServiceError::Inventory(e) => e.into(),
            ServiceError::Redemption(e) => e.into(),
            ServiceError::Storage(e) => AppError::Database(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
