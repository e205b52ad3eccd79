//! # Launchgap
//!
//! Housing price prediction and launch-gap ranking for HDB towns.
//!
//! Launchgap turns historical resale transactions into three answers:
//!
//! - what a described flat would sell for (resale and BTO estimate, with an
//!   affordability band),
//! - what a town's market looks like (flat mix, price trend, sizes, lease vintage),
//! - which towns have gone longest without a major launch while still showing
//!   an active resale market.
//!
//! ## Features
//!
//! - Closed town / flat-type domains validated at the encoder boundary
//! - Versioned model artifacts with atomic hot swap
//! - TTL-memoized market aggregation over an append-only transaction store
//! - Deterministic recommendation rationale with optional LLM narrative
//!
//! ## Example
//!
//! ```rust,ignore
//! use launchgap::{Engine, LaunchgapConfig, PredictionRequest};
//!
//! let engine = Engine::from_config(&LaunchgapConfig::load_default()?)?;
//! let result = engine
//!     .predict(PredictionRequest {
//!         town: "WOODLANDS".to_string(),
//!         flat_type: "4 ROOM".to_string(),
//!         floor_area_sqm: 90.0,
//!         storey: 5,
//!         lease_commence_year: 2000,
//!     })
//!     .await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod clock;
pub mod config;
pub mod inference;
pub mod io;
pub mod llm;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::LaunchgapConfig;
pub use inference::{ArtifactLoader, FileArtifactLoader, ModelArtifact, ModelHandle};
pub use llm::LlmProvider;
pub use models::{
    AffordabilityBand, FlatType, HealthStatus, PredictionRequest, PredictionResult,
    RecommendationEntry, RecommendationReport, Town, TownProfile, TransactionRecord, YearMonth,
};
pub use services::{
    Engine, EngineBuilder, LaunchHistory, MarketAggregator, NarrativeGenerator, PredictionService,
    RecommendationService, TownAnalysisService,
};
pub use storage::{MemoryTransactionStore, SqliteTransactionStore, TransactionStore};

/// Error type for launchgap operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed request field, lease year in the future, invalid record |
/// | `UnknownCategory` | Town or flat type outside the model artifact's domain |
/// | `OutOfRange` | Floor area, storey or lease year outside its sane range |
/// | `InsufficientData` | Aggregating a town with no transactions |
/// | `UnknownTown` | Analysis requested for an unrecognised town name |
/// | `ModelUnavailable` | No artifact installed, corrupt artifact, non-finite output |
/// | `ArtifactNotFound` | Artifact file missing at load time |
/// | `Timeout` | An engine path exceeded its deadline |
/// | `OperationFailed` | I/O, `SQLite`, CSV, HTTP or configuration failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// A request field is malformed or logically invalid.
    #[error("invalid input for '{field}': {reason}")]
    InvalidInput {
        /// The offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A categorical value is not part of the known domain.
    ///
    /// Raised when:
    /// - The town string does not name one of the 26 towns
    /// - The flat type is not one of the 7 flat types
    /// - The value parses but the loaded artifact was trained without it
    #[error("unknown {field} '{value}'")]
    UnknownCategory {
        /// The offending field (`town` or `flat_type`).
        field: String,
        /// The value as supplied by the caller.
        value: String,
    },

    /// A numeric field is outside its accepted range.
    #[error("{field} {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// The offending field.
        field: String,
        /// The supplied value.
        value: f64,
        /// Lowest accepted value.
        min: f64,
        /// Highest accepted value.
        max: f64,
    },

    /// Not enough transactions to compute statistics.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Town analysis requested for a name outside the town domain.
    #[error("unknown town '{0}'")]
    UnknownTown(String),

    /// The price model cannot serve inference.
    ///
    /// Raised when:
    /// - No artifact has been installed in the model handle
    /// - The artifact fails validation (bad schema, malformed trees)
    /// - The model produced a non-finite value
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The model artifact could not be located.
    #[error("model artifact not found at {location}: {cause}")]
    ArtifactNotFound {
        /// Path or version that was requested.
        location: String,
        /// The underlying cause.
        cause: String,
    },

    /// An engine path did not finish before its deadline.
    #[error("operation '{operation}' timed out after {elapsed_ms}ms")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// Deadline that was exceeded, in milliseconds.
        elapsed_ms: u64,
    },

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds an [`Error::InvalidInput`].
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Builds an [`Error::OperationFailed`] from any displayable cause.
    pub fn operation(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    /// Returns true for errors caused by the caller's input rather than the system.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::UnknownCategory { .. }
                | Self::OutOfRange { .. }
                | Self::UnknownTown(_)
        )
    }

    /// Short machine-readable kind, used as a metrics label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::UnknownCategory { .. } => "unknown_category",
            Self::OutOfRange { .. } => "out_of_range",
            Self::InsufficientData(_) => "insufficient_data",
            Self::UnknownTown(_) => "unknown_town",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::ArtifactNotFound { .. } => "artifact_not_found",
            Self::Timeout { .. } => "timeout",
            Self::OperationFailed { .. } => "operation_failed",
        }
    }
}

/// Result type alias for launchgap operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_input("lease_commence_year", "2031 is in the future");
        assert_eq!(
            err.to_string(),
            "invalid input for 'lease_commence_year': 2031 is in the future"
        );

        let err = Error::UnknownCategory {
            field: "flat_type".to_string(),
            value: "PENTHOUSE".to_string(),
        };
        assert_eq!(err.to_string(), "unknown flat_type 'PENTHOUSE'");

        let err = Error::operation("read_csv", "unexpected EOF");
        assert_eq!(err.to_string(), "operation 'read_csv' failed: unexpected EOF");
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::UnknownTown("ATLANTIS".to_string()).is_client_error());
        assert!(
            Error::OutOfRange {
                field: "storey".to_string(),
                value: 99.0,
                min: 1.0,
                max: 50.0,
            }
            .is_client_error()
        );
        assert!(!Error::ModelUnavailable("no artifact".to_string()).is_client_error());
        assert!(!Error::InsufficientData("BEDOK".to_string()).is_client_error());
    }

    #[test]
    fn test_error_kind_labels() {
        assert_eq!(
            Error::Timeout {
                operation: "recommend".to_string(),
                elapsed_ms: 30_000,
            }
            .kind(),
            "timeout"
        );
        assert_eq!(
            Error::ArtifactNotFound {
                location: "models/1.0.0.json".to_string(),
                cause: "No such file".to_string(),
            }
            .kind(),
            "artifact_not_found"
        );
    }
}
