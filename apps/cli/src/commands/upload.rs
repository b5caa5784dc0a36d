//! Upload command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use loanboard_training::DatasetStore;

use super::ProjectArgs;

/// Copy `file` into the project's dataset slot, replacing any previous upload.
pub fn execute(project: &ProjectArgs, file: &Path) -> Result<()> {
    let config = project.load_config()?;
    let layout = config.layout();
    layout.ensure_dirs().context("Failed to prepare project directories")?;

    let contents = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let info = DatasetStore::new(layout).replace(&contents).context("Failed to store dataset")?;

    println!("{}", "✓ File uploaded successfully".green().bold());
    println!("  Source: {}", file.display().to_string().dimmed());
    println!("  Stored: {}", info.path.display().to_string().cyan());
    println!("  Size:   {} bytes", info.size_bytes);
    Ok(())
}
