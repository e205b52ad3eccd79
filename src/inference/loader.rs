//! Artifact loading.

use super::artifact::{ModelArtifact, sha256_hex};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Source of model artifacts.
pub trait ArtifactLoader: Send + Sync {
    /// Loads the artifact named by `reference` (a version or a path).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArtifactNotFound`] if nothing exists at the reference,
    /// or [`Error::ModelUnavailable`] if it exists but is unusable.
    fn load(&self, reference: &str) -> Result<ModelArtifact>;
}

/// Loads artifacts from JSON files.
///
/// A reference that names an existing file (or ends in `.json`) is read
/// directly; anything else is treated as a version and resolved to
/// `<dir>/<version>.json`.
#[derive(Debug, Clone)]
pub struct FileArtifactLoader {
    dir: PathBuf,
    expected_sha256: Option<String>,
}

impl FileArtifactLoader {
    /// Creates a loader rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            expected_sha256: None,
        }
    }

    /// Requires loaded bytes to hash to `digest` (hex, case-insensitive).
    #[must_use]
    pub fn with_expected_sha256(mut self, digest: impl Into<String>) -> Self {
        self.expected_sha256 = Some(digest.into().to_lowercase());
        self
    }

    /// Resolves a reference to a file path.
    #[must_use]
    pub fn resolve(&self, reference: &str) -> PathBuf {
        let direct = Path::new(reference);
        if direct.is_file()
            || direct
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        {
            direct.to_path_buf()
        } else {
            self.dir.join(format!("{reference}.json"))
        }
    }
}

impl ArtifactLoader for FileArtifactLoader {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    fn load(&self, reference: &str) -> Result<ModelArtifact> {
        let path = self.resolve(reference);
        let bytes = std::fs::read(&path).map_err(|e| Error::ArtifactNotFound {
            location: path.display().to_string(),
            cause: e.to_string(),
        })?;

        if let Some(expected) = &self.expected_sha256 {
            let actual = sha256_hex(&bytes);
            if &actual != expected {
                metrics::counter!("model_digest_mismatch_total").increment(1);
                return Err(Error::ModelUnavailable(format!(
                    "artifact digest mismatch for {}: expected {expected}, got {actual}",
                    path.display()
                )));
            }
        }

        let artifact = ModelArtifact::from_bytes(&bytes)?;
        tracing::info!(
            path = %path.display(),
            version = artifact.version(),
            family = artifact.model().family(),
            features = artifact.feature_count(),
            "Loaded model artifact"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::artifact::ArtifactDocument;
    use crate::inference::model::RegressionModel;
    use crate::inference::schema::FeatureSchema;
    use crate::models::{FlatType, Town};

    fn write_artifact(dir: &Path, version: &str) -> Vec<u8> {
        let document = ArtifactDocument {
            version: version.to_string(),
            schema: FeatureSchema {
                features: vec!["floor_area_sqm".to_string()],
                towns: vec![Town::Bedok],
                flat_types: vec![FlatType::FourRoom],
            },
            model: RegressionModel::Linear {
                intercept: 0.0,
                coefficients: vec![5_000.0],
            },
            metadata: std::collections::BTreeMap::new(),
        };
        let bytes = serde_json::to_vec_pretty(&document).unwrap();
        std::fs::write(dir.join(format!("{version}.json")), &bytes).unwrap();
        bytes
    }

    #[test]
    fn test_load_by_version() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "1.0.0");

        let loader = FileArtifactLoader::new(dir.path());
        let artifact = loader.load("1.0.0").unwrap();
        assert_eq!(artifact.version(), "1.0.0");
    }

    #[test]
    fn test_load_by_path() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "1.1.0");
        let path = dir.path().join("1.1.0.json");

        let loader = FileArtifactLoader::new("/nonexistent");
        let artifact = loader.load(&path.display().to_string()).unwrap();
        assert_eq!(artifact.version(), "1.1.0");
    }

    #[test]
    fn test_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FileArtifactLoader::new(dir.path());
        assert!(matches!(
            loader.load("9.9.9"),
            Err(Error::ArtifactNotFound { .. })
        ));
    }

    #[test]
    fn test_corrupt_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.0.0.json"), b"{\"version\":").unwrap();
        let loader = FileArtifactLoader::new(dir.path());
        assert!(matches!(
            loader.load("1.0.0"),
            Err(Error::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_digest_check() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = write_artifact(dir.path(), "1.0.0");

        let good = FileArtifactLoader::new(dir.path())
            .with_expected_sha256(sha256_hex(&bytes).to_uppercase());
        assert!(good.load("1.0.0").is_ok());

        let bad = FileArtifactLoader::new(dir.path()).with_expected_sha256("00".repeat(32));
        assert!(matches!(bad.load("1.0.0"), Err(Error::ModelUnavailable(_))));
    }
}
