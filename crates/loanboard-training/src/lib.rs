//! Loanboard Training
//!
//! Filesystem and process primitives behind the loan approval training API:
//! - Locating the dataset and report paths of a project (`ProjectLayout`)
//! - Replacing the uploaded dataset (`DatasetStore`)
//! - Running the external training pipeline (`Trainer`, `ProcessTrainer`)
//! - Reporting which expected artifacts exist (`ArtifactReport`)
//! - Serialising training runs behind a single slot (`TrainingService`)

pub mod artifacts;
pub mod dataset;
pub mod error;
pub mod job;
pub mod layout;
pub mod process;
pub mod progress;
pub mod service;
pub mod trainer;

pub use artifacts::{ArtifactKind, ArtifactReport, ArtifactStatus, ExpectedArtifact, EXPECTED_ARTIFACTS};
pub use dataset::{DatasetInfo, DatasetStore};
pub use error::{TrainingError, TrainingResult};
pub use job::{RunOutput, TrainingRunId};
pub use layout::ProjectLayout;
pub use process::{PipelineCommand, ProcessTrainer};
pub use progress::{ProgressEvent, ProgressSink, StdoutProgressSink, TracingProgressSink};
pub use service::{TrainingReport, TrainingService};
pub use trainer::Trainer;
