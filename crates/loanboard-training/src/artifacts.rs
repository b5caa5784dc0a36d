use crate::layout::ProjectLayout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    File,
    Directory,
}

/// An output the external pipeline is expected to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedArtifact {
    /// Key used in API responses.
    pub key: &'static str,
    /// Path relative to the project root.
    pub relative_path: &'static str,
    /// Path under which the static report server exposes the artifact.
    pub public_path: &'static str,
    pub kind: ArtifactKind,
}

pub const EXPECTED_ARTIFACTS: [ExpectedArtifact; 4] = [
    ExpectedArtifact {
        key: "confusionMatrix",
        relative_path: "reports/confusion_matrix.png",
        public_path: "/reports/confusion_matrix.png",
        kind: ArtifactKind::File,
    },
    ExpectedArtifact {
        key: "featureImportance",
        relative_path: "reports/feature_importance.csv",
        public_path: "/reports/feature_importance.csv",
        kind: ArtifactKind::File,
    },
    ExpectedArtifact {
        key: "limeExplanations",
        relative_path: "reports/lime_explanations",
        public_path: "/reports/lime_explanations/",
        kind: ArtifactKind::Directory,
    },
    ExpectedArtifact {
        key: "shapExplanations",
        relative_path: "reports/shap_explanations",
        public_path: "/reports/shap_explanations/",
        kind: ArtifactKind::Directory,
    },
];

#[derive(Debug, Clone)]
pub struct ArtifactStatus {
    pub artifact: ExpectedArtifact,
    pub path: PathBuf,
    pub exists: bool,
}

impl ArtifactStatus {
    #[must_use]
    pub fn public_path(&self) -> Option<&'static str> {
        self.exists.then_some(self.artifact.public_path)
    }
}

/// Snapshot of which expected artifacts are present on disk.
#[derive(Debug, Clone)]
pub struct ArtifactReport {
    pub reports_dir: PathBuf,
    pub statuses: Vec<ArtifactStatus>,
}

impl ArtifactReport {
    /// Check every expected artifact against the live filesystem.
    ///
    /// A failed existence check is logged and reported as absent.
    pub fn collect(layout: &ProjectLayout) -> Self {
        let reports_dir = layout.reports_dir();
        log_reports_dir(&reports_dir);

        let statuses = EXPECTED_ARTIFACTS
            .iter()
            .map(|artifact| {
                let path = layout.artifact_path(artifact);
                let exists = match path.try_exists() {
                    Ok(exists) => exists,
                    Err(e) => {
                        warn!(artifact = artifact.key, path = %path.display(), error = %e, "Failed to check artifact");
                        false
                    }
                };
                if exists {
                    info!(artifact = artifact.key, path = %path.display(), "Artifact found");
                } else {
                    debug!(artifact = artifact.key, path = %path.display(), "Artifact not found");
                }
                ArtifactStatus { artifact: *artifact, path, exists }
            })
            .collect();

        Self { reports_dir, statuses }
    }

    #[must_use]
    pub fn all_present(&self) -> bool {
        self.statuses.iter().all(|s| s.exists)
    }

    /// Project-relative paths of the artifacts that are absent.
    #[must_use]
    pub fn missing(&self) -> Vec<String> {
        self.statuses
            .iter()
            .filter(|s| !s.exists)
            .map(|s| s.artifact.relative_path.to_string())
            .collect()
    }

    #[must_use]
    pub fn public_paths(&self) -> BTreeMap<&'static str, Option<&'static str>> {
        self.statuses.iter().map(|s| (s.artifact.key, s.public_path())).collect()
    }

    #[must_use]
    pub fn file_status(&self) -> BTreeMap<&'static str, bool> {
        self.statuses.iter().map(|s| (s.artifact.key, s.exists)).collect()
    }

    #[must_use]
    pub fn checked_paths(&self) -> BTreeMap<&'static str, String> {
        self.statuses.iter().map(|s| (s.artifact.key, s.path.display().to_string())).collect()
    }
}

fn log_reports_dir(reports_dir: &std::path::Path) {
    match std::fs::read_dir(reports_dir) {
        Ok(entries) => {
            let names: Vec<String> = entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect();
            debug!(reports_dir = %reports_dir.display(), files = ?names, "Files found in reports directory");
        }
        Err(e) => warn!(reports_dir = %reports_dir.display(), error = %e, "Error reading reports directory"),
    }
}
