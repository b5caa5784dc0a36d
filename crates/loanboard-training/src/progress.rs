use crate::job::TrainingRunId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { run_id: TrainingRunId },
    Stdout { run_id: TrainingRunId, line: String },
    Stderr { run_id: TrainingRunId, line: String },
    Finished { run_id: TrainingRunId, exit_code: i32 },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Echoes pipeline output to the terminal as it arrives.
#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { run_id } => println!("[train:{run_id}] started"),
            ProgressEvent::Stdout { line, .. } => println!("{}", line.trim_end()),
            ProgressEvent::Stderr { line, .. } => eprintln!("{}", line.trim_end()),
            ProgressEvent::Finished { run_id, exit_code } => {
                println!("[train:{run_id}] finished with exit code {exit_code}");
            }
        }
    }
}

/// Forwards pipeline output to `tracing`.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { run_id } => info!(%run_id, "Training process started"),
            ProgressEvent::Stdout { run_id, line } => debug!(%run_id, line = line.trim_end(), "Pipeline output"),
            ProgressEvent::Stderr { run_id, line } => warn!(%run_id, line = line.trim_end(), "Pipeline error output"),
            ProgressEvent::Finished { run_id, exit_code } => {
                info!(%run_id, exit_code, "Training process completed");
            }
        }
    }
}
