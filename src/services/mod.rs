//! Business logic services.
//!
//! Each service is synchronous, `Send + Sync` and shared through `Arc`.
//! [`Engine`] composes them behind async entry points with deadlines.

pub mod aggregation;
mod analysis;
pub mod encoder;
mod engine;
mod launch_history;
mod narrative;
mod prediction;
mod ranking;

pub use aggregation::{AggregationSettings, MarketAggregator, ProfileMap};
pub use analysis::TownAnalysisService;
pub use engine::{Engine, EngineBuilder};
pub use launch_history::{LaunchHistory, LeaseDerivedLaunchHistory, StaticLaunchHistory};
pub use narrative::{
    FALLBACK_ANALYSIS, LlmNarrativeGenerator, NARRATIVE_TOP_ENTRIES, NarrativeError,
    NarrativeGenerator, RankingSummary, StaticNarrative, TownSummary,
};
pub use prediction::{PredictionService, PricingPolicy};
pub use ranking::{RankingSettings, RecommendationService, demand_score, rationale};
