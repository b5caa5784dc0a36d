use crate::artifacts::ArtifactReport;
use crate::dataset::DatasetStore;
use crate::error::{TrainingError, TrainingResult};
use crate::job::{RunOutput, TrainingRunId};
use crate::layout::ProjectLayout;
use crate::progress::ProgressSink;
use crate::trainer::Trainer;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

/// Outcome of a run that exited cleanly and produced every expected artifact.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub run: RunOutput,
    pub artifacts: ArtifactReport,
}

/// Ties the dataset, the trainer and the artifact check together.
///
/// Only one run may be in flight; a second caller is rejected with
/// `TrainingError::RunInProgress` instead of racing on the shared output paths.
#[derive(Clone)]
pub struct TrainingService {
    layout: ProjectLayout,
    trainer: Arc<dyn Trainer>,
    slot: Arc<Semaphore>,
}

impl TrainingService {
    #[must_use]
    pub fn new(layout: ProjectLayout, trainer: Arc<dyn Trainer>) -> Self {
        Self { layout, trainer, slot: Arc::new(Semaphore::new(1)) }
    }

    #[must_use]
    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    #[must_use]
    pub fn dataset_store(&self) -> DatasetStore {
        DatasetStore::new(self.layout.clone())
    }

    /// Whether a run currently holds the slot.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.slot.available_permits() == 0
    }

    pub fn artifact_report(&self) -> ArtifactReport {
        ArtifactReport::collect(&self.layout)
    }

    pub async fn train(&self, progress: &dyn ProgressSink) -> TrainingResult<TrainingReport> {
        let store = self.dataset_store();
        let dataset = store.path();
        if !store.exists() {
            error!(path = %dataset.display(), "Data file not found");
            return Err(TrainingError::DatasetNotFound(dataset));
        }

        let _permit = Arc::clone(&self.slot).try_acquire_owned().map_err(|_| {
            info!("Rejecting training request, a run is already in progress");
            TrainingError::RunInProgress
        })?;

        let run_id = TrainingRunId::new();
        info!(
            %run_id,
            trainer = self.trainer.id(),
            dataset = %dataset.display(),
            project_root = %self.layout.root().display(),
            "Starting training run"
        );

        let run = self.trainer.run(&run_id, progress).await?;

        if !run.success() {
            error!(
                %run_id,
                exit_code = run.exit_code,
                stderr = run.stderr.trim(),
                stdout = run.stdout.trim(),
                "Training failed"
            );
            return Err(TrainingError::PipelineFailed {
                exit_code: run.exit_code,
                stdout: run.stdout,
                stderr: run.stderr,
            });
        }

        let artifacts = ArtifactReport::collect(&self.layout);
        let missing = artifacts.missing();
        if !missing.is_empty() {
            error!(%run_id, missing = ?missing, "Some required files were not generated");
            return Err(TrainingError::MissingArtifacts(missing));
        }

        info!(
            %run_id,
            duration_ms = run.duration().num_milliseconds(),
            "Training completed successfully, all files generated"
        );
        Ok(TrainingReport { run, artifacts })
    }
}
