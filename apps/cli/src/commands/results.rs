//! Results command implementation.

use anyhow::Result;
use colored::Colorize;
use loanboard_server::routes::ResultsResponse;
use loanboard_training::{ArtifactKind, ArtifactReport};

use super::ProjectArgs;

pub fn execute(project: &ProjectArgs, json_output: bool) -> Result<()> {
    let config = project.load_config()?;
    let report = ArtifactReport::collect(&config.layout());

    if json_output {
        println!("{}", serde_json::to_string_pretty(&ResultsResponse::from(&report))?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

/// Human-readable artifact table, shared with `train`.
pub fn print_report(report: &ArtifactReport) {
    println!();
    println!("{}", "Training Artifacts".bold().cyan());
    println!("  Reports: {}", report.reports_dir.display().to_string().dimmed());
    println!();

    println!("  {:<20} {:<10} {}", "Artifact", "Kind", "Path");
    println!("  {}", "─".repeat(70));
    for status in &report.statuses {
        let kind = match status.artifact.kind {
            ArtifactKind::File => "file",
            ArtifactKind::Directory => "directory",
        };
        let marker = if status.exists { "✓".green() } else { "✗".red() };
        println!(
            "{} {:<20} {:<10} {}",
            marker,
            status.artifact.key,
            kind.dimmed(),
            status.artifact.relative_path
        );
    }
    println!();

    if report.all_present() {
        println!("{}", "✓ All artifacts present".green().bold());
    } else {
        println!("{}", format!("✗ {} artifact(s) missing", report.missing().len()).yellow().bold());
    }
}
