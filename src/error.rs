use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError, generation::pipeline::PipelineError,
    state::state_machine::InvalidTransition,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Caller is not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The game has no free seat.
    #[error("game is full ({capacity} players)")]
    Full {
        /// Configured capacity of the game.
        capacity: u32,
    },
    /// Operation cannot be performed in the current game status.
    #[error("invalid state: {0}")]
    StateConflict(String),
    /// Not enough distinct questions could be produced.
    #[error("no questions available: {0}")]
    NoItemsAvailable(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::StateConflict(err.to_string())
    }
}

impl From<PipelineError> for ServiceError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NoItemsAvailable { .. } => {
                ServiceError::NoItemsAvailable(err.to_string())
            }
            PipelineError::Storage(source) => ServiceError::Unavailable(source),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// The game has no free seat.
    #[error("{0}")]
    Full(String),
    /// Caller is not allowed to act on the resource.
    #[error("{0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("{0}")]
    Conflict(String),
    /// Service unavailable.
    #[error("{0}")]
    ServiceUnavailable(String),
    /// Internal server error, including exhausted question generation.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Full(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-checkable discriminator sent next to the message.
    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation_error",
            AppError::Full(_) => "game_full",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "state_conflict",
            AppError::ServiceUnavailable(_) => "storage_unavailable",
            AppError::Internal(_) => "generation_failed",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => {
                error!(error = %source, "storage failure");
                AppError::ServiceUnavailable("storage unavailable".into())
            }
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            err @ ServiceError::Full { .. } => AppError::Full(err.to_string()),
            ServiceError::StateConflict(message) => AppError::Conflict(message),
            ServiceError::NoItemsAvailable(message) => AppError::Internal(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            success: false,
            error: self.to_string(),
            code: self.code(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_documented_statuses() {
        let cases = [
            (ServiceError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Full { capacity: 2 }, StatusCode::BAD_REQUEST),
            (ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::StateConflict("x".into()), StatusCode::CONFLICT),
            (
                ServiceError::NoItemsAvailable("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ServiceError::Unavailable(StorageError::Corrupted("bad row".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn full_error_keeps_capacity_in_message() {
        let err = AppError::from(ServiceError::Full { capacity: 3 });
        assert_eq!(err.to_string(), "game is full (3 players)");
        assert_eq!(err.code(), "game_full");
    }
}
