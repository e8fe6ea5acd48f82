//! Error types for the image dispatch service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the store's transactional operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task {0} is not in the expected state")]
    BadState(String),

    #[error("claim contended, retry")]
    Contended,

    #[error("{0}")]
    Internal(String),
}

/// Errors surfaced by the artifact sink.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decode uploaded image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Unified error type returned by HTTP handlers.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("no pending tasks available")]
    NoWork,

    #[error("task was claimed by another process, please retry")]
    Contended,

    #[error("{0}")]
    BadState(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::NotFound(format!("no task with id {id}")),
            StoreError::BadState(id) => {
                AppError::BadState(format!("task {id} is not in the expected state"))
            }
            StoreError::Contended => AppError::Contended,
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<ArtifactError> for AppError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::Decode(e) => {
                AppError::BadRequest(format!("could not decode uploaded image: {e}"))
            }
            ArtifactError::Io(e) => AppError::Internal(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NoWork => StatusCode::NOT_FOUND,
            AppError::Contended => StatusCode::CONFLICT,
            AppError::BadState(_) => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::error!(error = %self, "internal error handling request");
        }

        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
