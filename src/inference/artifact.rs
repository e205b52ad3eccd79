//! Versioned model artifacts.

use super::model::RegressionModel;
use super::schema::{FeatureSchema, FeatureSlot};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// On-disk artifact document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDocument {
    /// Semantic version (`MAJOR.MINOR.PATCH`).
    pub version: String,
    /// Feature schema.
    pub schema: FeatureSchema,
    /// Model parameters.
    pub model: RegressionModel,
    /// Free-form training metadata (training period, metrics).
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// A validated, immutable model artifact.
///
/// Built only through [`ModelArtifact::from_document`] or
/// [`ModelArtifact::from_bytes`], so every instance has a resolved schema and
/// model parameters that match its width.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    version: String,
    schema: FeatureSchema,
    slots: Vec<FeatureSlot>,
    model: RegressionModel,
    metadata: BTreeMap<String, serde_json::Value>,
    digest: String,
}

impl ModelArtifact {
    /// Decodes and validates serialized artifact bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelUnavailable`] if the bytes are not a valid artifact.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let document: ArtifactDocument = serde_json::from_slice(bytes)
            .map_err(|e| Error::ModelUnavailable(format!("artifact is not decodable: {e}")))?;
        Self::build(document, sha256_hex(bytes))
    }

    /// Validates an in-memory document. The digest covers its JSON encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelUnavailable`] if the document is invalid.
    pub fn from_document(document: ArtifactDocument) -> Result<Self> {
        let bytes = serde_json::to_vec(&document)
            .map_err(|e| Error::ModelUnavailable(format!("artifact is not encodable: {e}")))?;
        Self::build(document, sha256_hex(&bytes))
    }

    fn build(document: ArtifactDocument, digest: String) -> Result<Self> {
        validate_version(&document.version)?;
        let slots = document.schema.resolve()?;
        document.model.validate(slots.len())?;

        Ok(Self {
            version: document.version,
            schema: document.schema,
            slots,
            model: document.model,
            metadata: document.metadata,
            digest,
        })
    }

    /// Artifact version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Feature schema.
    #[must_use]
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Resolved schema columns, in input order.
    #[must_use]
    pub fn slots(&self) -> &[FeatureSlot] {
        &self.slots
    }

    /// Model parameters.
    #[must_use]
    pub const fn model(&self) -> &RegressionModel {
        &self.model
    }

    /// Training metadata.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Width of the input vector.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.slots.len()
    }

    /// Lower-case hex SHA-256 of the serialized artifact.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Lower-case hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn validate_version(version: &str) -> Result<()> {
    let parts: Vec<&str> = version.split('.').collect();
    let well_formed = parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if well_formed {
        Ok(())
    } else {
        Err(Error::ModelUnavailable(format!(
            "artifact version '{version}' is not MAJOR.MINOR.PATCH"
        )))
    }
}
