use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("dataset not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("dataset missing after write: {}", .0.display())]
    DatasetMissingAfterWrite(PathBuf),

    #[error("a training run is already in progress")]
    RunInProgress,

    #[error("failed to spawn pipeline `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pipeline exited with code {exit_code}")]
    PipelineFailed { exit_code: i32, stdout: String, stderr: String },

    #[error("pipeline finished but artifacts are missing: {}", .0.join(", "))]
    MissingArtifacts(Vec<String>),

    #[error("pipeline timed out after {after:?}")]
    TimedOut { after: Duration, stdout: String, stderr: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrainingError {
    /// Whether the failure was caused by the caller rather than the pipeline or host.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::DatasetNotFound(_))
    }
}
