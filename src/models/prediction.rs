//! Prediction request and result types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Description of a flat to price.
///
/// Town and flat type stay as caller-supplied strings so that an unknown
/// value can be reported verbatim by the encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Town name.
    pub town: String,
    /// Flat type label, e.g. `4 ROOM`.
    pub flat_type: String,
    /// Floor area in square metres.
    pub floor_area_sqm: f64,
    /// Storey.
    pub storey: u32,
    /// Year the lease commenced.
    pub lease_commence_year: i32,
}

/// Income bracket a BTO price is suitable for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffordabilityBand {
    /// Household income below $7,000.
    Lower,
    /// Household income between $7,000 and $21,000.
    Middle,
    /// Household income above $21,000.
    High,
}

impl AffordabilityBand {
    /// Human-readable label shown to users.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Lower => "Lower Income (<$7,000)",
            Self::Middle => "Middle Income ($7,000-$21,000)",
            Self::High => "High Income (>$21,000)",
        }
    }
}

impl fmt::Display for AffordabilityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a price prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Canonical town name.
    pub town: String,
    /// Canonical flat type label.
    pub flat_type: String,
    /// Predicted resale price, never negative.
    pub predicted_resale_price: f64,
    /// Resale price less the BTO discount.
    pub predicted_bto_price: f64,
    /// Affordability label text.
    pub affordability_label: String,
    /// Affordability band.
    pub affordability: AffordabilityBand,
    /// Version of the artifact that produced the estimate.
    pub model_version: String,
    /// Set when the raw model output was negative and clamped to zero.
    #[serde(skip)]
    pub clamped: bool,
}
