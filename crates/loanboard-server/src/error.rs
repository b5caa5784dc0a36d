//! API error type and its mapping onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use loanboard_training::TrainingError;
use serde_json::{Value, json};
use tracing::{error, warn};

/// Message returned for failures whose detail must stay server-side.
pub const GENERIC_ERROR: &str = "Something went wrong!";

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get error type for logging
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
            Self::Training(e) => match e {
                TrainingError::DatasetNotFound(_) => "dataset_not_found",
                TrainingError::DatasetMissingAfterWrite(_) => "upload_failed",
                TrainingError::RunInProgress => "run_in_progress",
                TrainingError::PipelineFailed { .. } => "pipeline_failed",
                TrainingError::MissingArtifacts(_) => "missing_artifacts",
                TrainingError::TimedOut { .. } => "pipeline_timeout",
                TrainingError::Spawn { .. } | TrainingError::Io(_) | TrainingError::Other(_) => {
                    "internal_error"
                }
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Training(e) if e.is_user_error() => StatusCode::BAD_REQUEST,
            Self::Training(e) => match e {
                TrainingError::RunInProgress => StatusCode::CONFLICT,
                TrainingError::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
                TrainingError::DatasetNotFound(_)
                | TrainingError::DatasetMissingAfterWrite(_)
                | TrainingError::PipelineFailed { .. }
                | TrainingError::MissingArtifacts(_)
                | TrainingError::Spawn { .. }
                | TrainingError::Io(_)
                | TrainingError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// JSON body sent to the caller.
    pub fn body(&self) -> Value {
        match self {
            Self::BadRequest(msg) => json!({ "error": msg }),
            Self::Internal(_) => json!({ "error": GENERIC_ERROR }),
            Self::Training(e) => match e {
                TrainingError::DatasetNotFound(_) => {
                    json!({ "error": "Data file not found. Please upload the data first." })
                }
                TrainingError::DatasetMissingAfterWrite(_) => json!({ "error": "File upload failed" }),
                TrainingError::RunInProgress => json!({ "error": "A training run is already in progress" }),
                TrainingError::PipelineFailed { stdout, stderr, .. } => {
                    json!({ "error": "Training failed", "details": stderr, "output": stdout })
                }
                TrainingError::MissingArtifacts(missing) => json!({
                    "error": "Training completed but some files were not generated",
                    "missingFiles": missing,
                }),
                TrainingError::TimedOut { stdout, stderr, .. } => {
                    json!({ "error": "Training timed out", "details": stderr, "output": stdout })
                }
                TrainingError::Spawn { .. } | TrainingError::Io(_) | TrainingError::Other(_) => {
                    json!({ "error": GENERIC_ERROR })
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_type = self.error_type();

        if status.is_server_error() {
            error!(error_type, status = status.as_u16(), details = %self, "Request failed");
        } else {
            warn!(error_type, status = status.as_u16(), details = %self, "Request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}

/// Errors that stop the server from starting or serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Project directory setup errors
    #[error("Project setup error: {0}")]
    Setup(#[from] TrainingError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for server startup.
pub type Result<T> = std::result::Result<T, ServerError>;
