//! Launch recommendation types.

use super::{FlatType, Town, YearMonth};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a flat type's projected price was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingBasis {
    /// Price model inference on a representative unit.
    Model,
    /// Discounted median of observed resale prices.
    MarketMedian,
}

/// Market facts shown alongside a recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketCharacteristics {
    /// Transactions in the town.
    pub total_transactions: usize,
    /// Most frequently traded flat types, most frequent first.
    pub predominant_flat_types: Vec<FlatType>,
}

/// One ranked town.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    /// The town.
    pub town: Town,
    /// Years since the town's last major launch.
    pub years_since_last_major_launch: u32,
    /// Normalized demand score in `[0, 1]`.
    pub demand_score: f64,
    /// Transactions within the recent window.
    pub recent_market_activity: usize,
    /// Projected BTO price per flat type.
    pub predicted_pricing: BTreeMap<FlatType, f64>,
    /// Basis of each projected price.
    pub pricing_basis: BTreeMap<FlatType, PricingBasis>,
    /// Deterministic explanation of the ranking.
    pub rationale: String,
    /// Supporting market facts.
    pub market_characteristics: MarketCharacteristics,
}

/// Origin of the prose analysis attached to a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Produced by the narrative generator.
    Generated,
    /// Fixed text used when the generator was unavailable.
    Fallback,
    /// No narrative was requested.
    None,
}

/// Ranked recommendations plus a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationReport {
    /// Reference month used for launch gaps.
    pub as_of: YearMonth,
    /// Ranked entries, best first.
    pub entries: Vec<RecommendationEntry>,
    /// One-line summary; explains empty results.
    pub summary: String,
    /// Optional prose analysis.
    pub analysis: Option<String>,
    /// Where `analysis` came from.
    pub analysis_source: AnalysisSource,
}
