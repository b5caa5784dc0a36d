//! Training command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use loanboard_server::routes::ResultsResponse;
use loanboard_training::{
    ProcessTrainer, ProgressSink, StdoutProgressSink, TracingProgressSink, TrainingError, TrainingService,
};
use serde_json::json;

use super::ProjectArgs;
use super::results::print_report;

/// Run the pipeline once in the foreground.
///
/// Pipeline output is echoed live unless `json_output` is set, in which case it
/// goes to the log and only the final summary is printed.
pub async fn execute(project: &ProjectArgs, json_output: bool) -> Result<()> {
    let config = project.load_config()?;
    let layout = config.layout();
    layout.ensure_dirs().context("Failed to prepare project directories")?;

    let service = TrainingService::new(layout, Arc::new(ProcessTrainer::new(config.pipeline_command())));
    let progress: &dyn ProgressSink = if json_output { &TracingProgressSink } else { &StdoutProgressSink };

    if !json_output {
        println!("{}", "Running training pipeline...".bold().cyan());
        println!();
    }

    match service.train(progress).await {
        Ok(report) => {
            if json_output {
                let out = json!({
                    "run_id": report.run.run_id,
                    "exit_code": report.run.exit_code,
                    "started_at": report.run.started_at,
                    "finished_at": report.run.finished_at,
                    "artifacts": ResultsResponse::from(&report.artifacts),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            print_report(&report.artifacts);
            println!();
            println!("{}", "Training completed successfully".bold().green());
            println!("  Run:      {}", report.run.run_id.to_string().cyan());
            println!("  Duration: {}s", report.run.duration().num_seconds());
            println!();
            Ok(())
        }
        Err(err) => {
            if !json_output && matches!(err, TrainingError::MissingArtifacts(_)) {
                print_report(&service.artifact_report());
            }
            Err(err).context("Training failed")
        }
    }
}
