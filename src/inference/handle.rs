//! Swappable reference to the active model artifact.

use super::artifact::ModelArtifact;
use super::loader::ArtifactLoader;
use crate::{Error, Result};
use std::sync::{Arc, PoisonError, RwLock};

/// Holds the artifact used for inference.
///
/// Readers clone the inner `Arc` under a short read lock and then evaluate
/// without holding any lock, so a swap never blocks on in-flight predictions
/// and a request sees exactly one artifact.
#[derive(Debug, Default)]
pub struct ModelHandle {
    current: RwLock<Option<Arc<ModelArtifact>>>,
}

impl ModelHandle {
    /// Creates an empty handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle with an installed artifact.
    #[must_use]
    pub fn with_artifact(artifact: ModelArtifact) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(artifact))),
        }
    }

    /// Returns the active artifact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelUnavailable`] if none is installed.
    pub fn current(&self) -> Result<Arc<ModelArtifact>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| Error::ModelUnavailable("no model artifact installed".to_string()))
    }

    /// Returns true if an artifact is installed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Installs `artifact`, returning the one it replaced.
    pub fn install(&self, artifact: ModelArtifact) -> Option<Arc<ModelArtifact>> {
        let next = Arc::new(artifact);
        let version = next.version().to_string();
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(next);

        metrics::counter!("model_swaps_total").increment(1);
        tracing::info!(
            version = %version,
            previous = previous.as_ref().map(|a| a.version()),
            "Installed model artifact"
        );
        previous
    }

    /// Loads `reference` and installs it. The active artifact is untouched
    /// if loading fails.
    ///
    /// # Errors
    ///
    /// Propagates the loader's error.
    pub fn reload(&self, loader: &dyn ArtifactLoader, reference: &str) -> Result<Arc<ModelArtifact>> {
        let artifact = loader.load(reference).inspect_err(|e| {
            tracing::warn!(reference, error = %e, "Model reload failed, keeping current artifact");
        })?;
        self.install(artifact);
        self.current()
    }
}
