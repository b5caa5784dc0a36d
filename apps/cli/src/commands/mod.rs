//! Command implementations for the Loanboard CLI.

pub mod results;
pub mod serve;
pub mod train;
pub mod upload;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use loanboard_server::config::Config;
use tracing::debug;

/// Options shared by every command that touches the project.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Configuration file (defaults to ./loanboard.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Training project root (overrides config and LOANBOARD_PROJECT_ROOT)
    #[arg(long)]
    pub project_root: Option<PathBuf>,
}

impl ProjectArgs {
    /// Resolve the effective configuration: flags over environment over file.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref()).context("Failed to load configuration")?;
        if let Some(root) = &self.project_root {
            config.project.root.clone_from(root);
        }
        debug!(?config, "Loaded configuration");
        Ok(config)
    }
}
