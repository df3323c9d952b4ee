use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sendtrack_sync::{DatabaseError, SyncError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// A sync run is already in flight.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Database(DatabaseError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<DatabaseError> for AppError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(msg) => Self::NotFound(msg),
            other => Self::Database(other),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Sync(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
