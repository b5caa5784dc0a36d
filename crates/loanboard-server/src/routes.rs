//! API route handlers

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use loanboard_training::{ArtifactReport, TracingProgressSink, TrainingError};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::AppState;
use crate::error::{ApiError, ApiResult};

/// Multipart field carrying the dataset.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub message: String,
    pub output: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    /// Public path per artifact key, `null` when absent.
    #[serde(flatten)]
    pub artifacts: BTreeMap<&'static str, Option<&'static str>>,
    pub file_status: BTreeMap<&'static str, bool>,
    pub debug: ResultsDebug,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsDebug {
    pub reports_dir: String,
    pub checked_paths: BTreeMap<&'static str, String>,
}

impl From<&ArtifactReport> for ResultsResponse {
    fn from(report: &ArtifactReport) -> Self {
        Self {
            artifacts: report.public_paths(),
            file_status: report.file_status(),
            debug: ResultsDebug {
                reports_dir: report.reports_dir.display().to_string(),
                checked_paths: report.checked_paths(),
            },
        }
    }
}

/// `POST /api/upload`: store the `file` part as the project dataset.
///
/// The part is streamed to a staged file in the data directory and only
/// renamed over the dataset once it has been received completely.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<MessageResponse>> {
    info!("File upload request received");
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let store = state.service.dataset_store();
    let mut staged = None;
    while let Some(mut field) = multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.body_text()))? {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }
        debug!(original_name = ?field.file_name(), "Original file name");

        let file = store.stage()?;
        let mut writer = tokio::fs::File::from_std(file.as_file().try_clone().map_err(TrainingError::from)?);
        let mut size_bytes: u64 = 0;
        while let Some(chunk) = field.chunk().await.map_err(|e| ApiError::BadRequest(e.body_text()))? {
            writer.write_all(&chunk).await.map_err(TrainingError::from)?;
            size_bytes += chunk.len() as u64;
        }
        writer.flush().await.map_err(TrainingError::from)?;
        debug!(size_bytes, "Upload received");

        staged = Some(file);
        break;
    }

    let Some(staged) = staged else {
        return Err(ApiError::BadRequest("No file uploaded".to_string()));
    };

    tokio::task::spawn_blocking(move || store.commit(staged))
        .await
        .map_err(|e| ApiError::Internal(format!("upload task failed: {e}")))??;

    Ok(Json(MessageResponse { message: "File uploaded successfully".to_string() }))
}

/// `POST /api/train`: run the pipeline and wait for it.
///
/// The run is detached from the request, so a client that disconnects does not
/// abort a pipeline that has already started.
pub async fn train(State(state): State<AppState>) -> ApiResult<Json<TrainResponse>> {
    info!("Model training request received");

    let service = state.service.clone();
    let report = tokio::spawn(async move { service.train(&TracingProgressSink).await })
        .await
        .map_err(|e| ApiError::Internal(format!("training task failed: {e}")))??;

    Ok(Json(TrainResponse {
        message: "Training completed successfully".to_string(),
        output: report.run.stdout,
    }))
}

/// `GET /api/results`: which artifacts exist right now.
pub async fn results(State(state): State<AppState>) -> Json<ResultsResponse> {
    info!("Results request received");
    let report = state.service.artifact_report();
    Json(ResultsResponse::from(&report))
}
