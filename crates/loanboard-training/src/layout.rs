use crate::artifacts::ExpectedArtifact;
use crate::error::TrainingResult;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DATA_DIR: &str = "data";
const REPORTS_DIR: &str = "reports";
const DATASET_FILE: &str = "loan_data.csv";

/// Filesystem layout shared by the upload endpoint, the report endpoint and
/// the external pipeline.
///
/// ```text
/// <root>/data/loan_data.csv
/// <root>/reports/...
/// ```
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    /// A relative `root` is resolved against the current directory here, so
    /// every derived path stays valid for a child running inside the root.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    #[must_use]
    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir().join(DATASET_FILE)
    }

    #[must_use]
    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR)
    }

    #[must_use]
    pub fn artifact_path(&self, artifact: &ExpectedArtifact) -> PathBuf {
        self.root.join(artifact.relative_path)
    }

    /// Create `data/` and `reports/` if they do not exist yet.
    pub fn ensure_dirs(&self) -> TrainingResult<()> {
        for dir in [self.data_dir(), self.reports_dir()] {
            if dir.is_dir() {
                debug!(path = %dir.display(), "Directory exists");
            } else {
                std::fs::create_dir_all(&dir)?;
                info!(path = %dir.display(), "Created directory");
            }
        }
        Ok(())
    }
}
