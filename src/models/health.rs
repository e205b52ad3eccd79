//! Engine health snapshot.

use serde::{Deserialize, Serialize};

/// Health of the engine's model and data dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `ok` when a model is loaded, `degraded` otherwise.
    pub status: String,
    /// Whether a model artifact is installed.
    pub model_loaded: bool,
    /// Installed artifact version.
    pub model_version: Option<String>,
    /// Number of model features (0 without a model).
    pub feature_count: usize,
    /// SHA-256 of the installed artifact.
    pub artifact_digest: Option<String>,
    /// Transactions in the store, when the store could be counted.
    pub transactions: Option<usize>,
}
