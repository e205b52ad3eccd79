//! Data models for launchgap.
//!
//! This module contains the core data structures shared by the store,
//! the inference path and the ranking services.

mod domain;
mod health;
mod prediction;
mod profile;
mod recommendation;
mod transaction;

pub use domain::{FlatType, Town};
pub use health::HealthStatus;
pub use prediction::{AffordabilityBand, PredictionRequest, PredictionResult};
pub use profile::{
    DataPeriod, FlatTypeTrend, LeaseVintage, PriceRange, PriceTrend, RepresentativeUnit,
    TownProfile,
};
pub use recommendation::{
    AnalysisSource, MarketCharacteristics, PricingBasis, RecommendationEntry,
    RecommendationReport,
};
pub use transaction::{TransactionRecord, YearMonth};
