//! Configuration module for the Loanboard server.
//!
//! Values are layered: defaults, then a TOML file, then `LOANBOARD_*`
//! environment variables. Command-line flags are applied on top by the CLI.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use loanboard_training::{PipelineCommand, ProjectLayout};
use serde::Deserialize;
use thiserror::Error;

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "loanboard.toml";

pub const ENV_ADDRESS: &str = "LOANBOARD_ADDRESS";
pub const ENV_PROJECT_ROOT: &str = "LOANBOARD_PROJECT_ROOT";
pub const ENV_PIPELINE_TIMEOUT_SECS: &str = "LOANBOARD_PIPELINE_TIMEOUT_SECS";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The address to bind the HTTP server to.
    #[serde(default = "default_address")]
    pub address: SocketAddr,
}

fn default_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5001))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: default_address() }
    }
}

/// Location of the training project on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Directory holding `data/`, `reports/` and the pipeline script.
    #[serde(default = "default_project_root")]
    pub root: PathBuf,
    /// Static UI assets served for unmatched paths.
    #[serde(default)]
    pub ui_dir: Option<PathBuf>,
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { root: default_project_root(), ui_dir: None }
    }
}

/// External pipeline invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Kill the pipeline after this many seconds. Absent means no limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_program() -> String {
    "python".to_string()
}

fn default_args() -> Vec<String> {
    vec!["run_pipeline.py".to_string()]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { program: default_program(), args: default_args(), timeout_secs: None }
    }
}

/// Root configuration for Loanboard.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Load configuration from `path` (or `./loanboard.toml` when present),
    /// then apply environment overrides.
    ///
    /// An explicit `path` that does not exist is an error; a missing default
    /// file is not.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() { Self::load_from_file(default_path)? } else { Self::default() }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `LOANBOARD_*` overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup(ENV_ADDRESS) {
            self.server.address = address
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("{ENV_ADDRESS}={address}: {e}")))?;
        }
        if let Some(root) = lookup(ENV_PROJECT_ROOT) {
            self.project.root = PathBuf::from(root);
        }
        if let Some(secs) = lookup(ENV_PIPELINE_TIMEOUT_SECS) {
            let secs = secs
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue(format!("{ENV_PIPELINE_TIMEOUT_SECS}={secs}: {e}")))?;
            self.pipeline.timeout_secs = Some(secs);
        }
        Ok(())
    }

    #[must_use]
    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(self.project.root.clone())
    }

    #[must_use]
    pub fn pipeline_timeout(&self) -> Option<Duration> {
        self.pipeline.timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn pipeline_command(&self) -> PipelineCommand {
        PipelineCommand::for_layout(&self.layout(), self.pipeline.program.clone())
            .with_args(self.pipeline.args.iter().cloned())
            .with_timeout(self.pipeline_timeout())
    }
}
