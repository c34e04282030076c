use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::room::RoomError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Room key mismatch.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Malformed room, question, name or status.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Duplicate player name or duplicate submission.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Operation cannot be performed in the current room status.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested room or player was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The room kept changing underneath the request; retrying may succeed.
    #[error("room busy: {0}")]
    Busy(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Duplicate { what } => ServiceError::Conflict(format!("{what} already recorded")),
            StorageError::VersionConflict { id, .. } => ServiceError::Busy(format!(
                "room `{id}` is being modified concurrently; retry the request"
            )),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<RoomError> for ServiceError {
    fn from(err: RoomError) -> Self {
        let message = err.to_string();
        match err {
            RoomError::InvalidDefinition(_)
            | RoomError::UnknownStatus(_)
            | RoomError::BlankPlayerName => ServiceError::InvalidInput(message),
            RoomError::WrongKey => ServiceError::Unauthorized(message),
            RoomError::DuplicatePlayer(_) => ServiceError::Conflict(message),
            RoomError::JoinNotAllowed(_)
            | RoomError::NotInProgress(_)
            | RoomError::NoActiveQuestion => ServiceError::InvalidState(message),
            RoomError::NotAMember(_) => ServiceError::NotFound(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::Validation(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed room, question, name or status.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Room key mismatch.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Duplicate player name or submission.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Operation not allowed in the current room status.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Unknown room or player.
    #[error("not found: {0}")]
    NotFound(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Unauthorized(_) => "auth_error",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidState(_) => "invalid_state",
            AppError::NotFound(_) => "not_found",
            AppError::ServiceUnavailable(_) => "unavailable",
        }
    }

    /// Every request-scoped rule violation is reported as 422.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::Validation(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::InvalidState(message) => AppError::InvalidState(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Busy(message) => AppError::ServiceUnavailable(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error kind.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
        });

        (self.status(), payload).into_response()
    }
}
