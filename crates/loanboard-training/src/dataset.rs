use crate::error::{TrainingError, TrainingResult};
use crate::layout::ProjectLayout;
use serde::Serialize;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

/// What was written by the last successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// First line of the file, when it could be read.
    pub header: Option<String>,
}

/// Owns the single dataset slot of a project.
///
/// Every upload replaces the previous file; the caller's filename is never used.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    layout: ProjectLayout,
}

impl DatasetStore {
    #[must_use]
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.layout.dataset_path()
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Replace the dataset with `contents`.
    pub fn replace(&self, contents: &[u8]) -> TrainingResult<DatasetInfo> {
        let mut staged = self.stage()?;
        staged.write_all(contents)?;
        staged.flush()?;
        self.commit(staged)
    }

    /// Empty temporary file in the data directory, for writing an upload into.
    ///
    /// Dropping it without `commit` removes it and leaves the current dataset
    /// untouched.
    pub fn stage(&self) -> TrainingResult<NamedTempFile> {
        let data_dir = self.layout.data_dir();
        std::fs::create_dir_all(&data_dir)?;
        Ok(NamedTempFile::new_in(&data_dir)?)
    }

    /// Rename a staged file over the dataset path, so readers never observe a
    /// partial file.
    pub fn commit(&self, staged: NamedTempFile) -> TrainingResult<DatasetInfo> {
        let dest = self.path();
        staged.persist(&dest).map_err(|e| TrainingError::Io(e.error))?;

        // Existence only; content is not verified.
        let metadata = match std::fs::metadata(&dest) {
            Ok(m) => m,
            Err(e) => {
                error!(path = %dest.display(), error = %e, "Dataset not found after upload");
                return Err(TrainingError::DatasetMissingAfterWrite(dest));
            }
        };

        let header = read_header(&dest);
        info!(path = %dest.display(), size_bytes = metadata.len(), "Dataset stored");
        if let Some(ref header) = header {
            debug!(header = %header, "Dataset header");
        }

        Ok(DatasetInfo { path: dest, size_bytes: metadata.len(), header })
    }
}

fn read_header(path: &std::path::Path) -> Option<String> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Error reading dataset header");
            return None;
        }
    };
    let mut line = Vec::new();
    match BufReader::new(file).read_until(b'\n', &mut line) {
        Ok(0) => None,
        Ok(_) => Some(String::from_utf8_lossy(&line).trim_end().to_string()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Error reading dataset header");
            None
        }
    }
}
