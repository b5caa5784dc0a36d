use crate::error::TrainingResult;
use crate::job::{RunOutput, TrainingRunId};
use crate::progress::ProgressSink;
use async_trait::async_trait;

/// Something that can execute one training run to completion.
///
/// A non-zero exit is reported through `RunOutput::exit_code`, not as an error;
/// errors are reserved for runs that could not be started or observed.
#[async_trait]
pub trait Trainer: Send + Sync {
    fn id(&self) -> &'static str;

    async fn run(&self, run_id: &TrainingRunId, progress: &dyn ProgressSink) -> TrainingResult<RunOutput>;
}
