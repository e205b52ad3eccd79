//! Prose analysis over ranked recommendations.
//!
//! The narrative is optional enrichment: the engine substitutes
//! [`FALLBACK_ANALYSIS`] whenever a generator fails, is malformed or is slow.

use crate::llm::LlmProvider;
use crate::models::{FlatType, RecommendationReport, Town, YearMonth};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use thiserror::Error;

/// Entries included in the prompt.
pub const NARRATIVE_TOP_ENTRIES: usize = 5;

/// Shortest reply accepted as prose.
const MIN_NARRATIVE_CHARS: usize = 40;

/// Fixed analysis used when no generated narrative is available.
pub const FALLBACK_ANALYSIS: &str = "\
Automated analysis is unavailable; the ranking above is based on launch history and resale activity alone.

- Towns with ten or more years since their last major launch may carry pent-up demand for new flats.
- An active resale market indicates that households continue to want to live in the town.
- Check proximity to MRT lines, schools and commercial centres before drawing conclusions.
- Long gaps between launches often coincide with infrastructure upgrades and area maturation.";

const SYSTEM_PROMPT: &str =
    "You are an expert real estate analyst specializing in Singapore HDB properties.";

/// Why a narrative could not be produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NarrativeError {
    /// The backing service failed or is not configured.
    #[error("narrative unavailable: {0}")]
    Unavailable(String),
    /// The service replied with something that is not usable prose.
    #[error("narrative malformed: {0}")]
    Malformed(String),
}

impl NarrativeError {
    /// Metrics label for the failure.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// One town as presented to the narrative generator.
#[derive(Debug, Clone, PartialEq)]
pub struct TownSummary {
    /// The town.
    pub town: Town,
    /// Years since the last major launch.
    pub years_since_last_major_launch: u32,
    /// Demand score in `[0, 1]`.
    pub demand_score: f64,
    /// Recent transactions.
    pub recent_market_activity: usize,
    /// Projected BTO prices.
    pub predicted_pricing: BTreeMap<FlatType, f64>,
}

/// Compact view of a recommendation report.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingSummary {
    /// Reference month of the ranking.
    pub as_of: YearMonth,
    /// Report summary line.
    pub summary: String,
    /// Top entries, best first.
    pub towns: Vec<TownSummary>,
}

impl RankingSummary {
    /// Builds a summary over the report's top entries.
    #[must_use]
    pub fn from_report(report: &RecommendationReport) -> Self {
        let towns = report
            .entries
            .iter()
            .take(NARRATIVE_TOP_ENTRIES)
            .map(|entry| TownSummary {
                town: entry.town,
                years_since_last_major_launch: entry.years_since_last_major_launch,
                demand_score: entry.demand_score,
                recent_market_activity: entry.recent_market_activity,
                predicted_pricing: entry.predicted_pricing.clone(),
            })
            .collect();
        Self {
            as_of: report.as_of,
            summary: report.summary.clone(),
            towns,
        }
    }

    /// Renders the data block sent to the generator.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("As of {}: {}\n", self.as_of, self.summary);
        for (rank, town) in self.towns.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {}: {} years since last major launch, demand score {:.2}, {} recent resale transactions",
                rank + 1,
                town.town,
                town.years_since_last_major_launch,
                town.demand_score,
                town.recent_market_activity,
            );
            for (flat_type, price) in &town.predicted_pricing {
                let _ = writeln!(out, "   - {flat_type}: estimated BTO price ${price:.0}");
            }
        }
        out
    }
}

/// Produces prose analysis for a ranking.
pub trait NarrativeGenerator: Send + Sync {
    /// Writes an analysis of the ranking.
    ///
    /// # Errors
    ///
    /// Returns [`NarrativeError`] when no usable prose was produced.
    fn generate(&self, summary: &RankingSummary) -> Result<String, NarrativeError>;
}

/// Narrative generator backed by an LLM provider.
pub struct LlmNarrativeGenerator<P: LlmProvider> {
    provider: P,
}

impl<P: LlmProvider> LlmNarrativeGenerator<P> {
    /// Wraps a provider.
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    fn user_prompt(summary: &RankingSummary) -> String {
        format!(
            "A user asked: Which towns should be prioritised for the next BTO launch?\n\n\
             We have the following data:\n{}\n\
             Please analyze and provide recommendations.",
            summary.render()
        )
    }
}

impl<P: LlmProvider> NarrativeGenerator for LlmNarrativeGenerator<P> {
    fn generate(&self, summary: &RankingSummary) -> Result<String, NarrativeError> {
        let reply = self
            .provider
            .complete_with_system(SYSTEM_PROMPT, &Self::user_prompt(summary))
            .map_err(|e| NarrativeError::Unavailable(e.to_string()))?;
        check_prose(&reply)
    }
}

/// Generator that always returns the same text.
#[derive(Debug, Clone)]
pub struct StaticNarrative(pub String);

impl NarrativeGenerator for StaticNarrative {
    fn generate(&self, _summary: &RankingSummary) -> Result<String, NarrativeError> {
        check_prose(&self.0)
    }
}

fn check_prose(reply: &str) -> Result<String, NarrativeError> {
    let text = reply.trim();
    if text.chars().count() < MIN_NARRATIVE_CHARS {
        return Err(NarrativeError::Malformed(format!(
            "reply too short ({} chars)",
            text.chars().count()
        )));
    }
    if text.starts_with('{') || text.starts_with('[') {
        return Err(NarrativeError::Malformed(
            "reply is structured data, not prose".to_string(),
        ));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AnalysisSource, MarketCharacteristics, PricingBasis, RecommendationEntry,
    };
    use crate::{Error, Result};
    use std::sync::Mutex;

    struct Recording {
        reply: Result<String>,
        seen: Mutex<Vec<String>>,
    }

    impl LlmProvider for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn complete(&self, prompt: &str) -> Result<String> {
            self.seen.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(Error::operation("recording", e)),
            }
        }
    }

    fn entry(town: Town, years: u32) -> RecommendationEntry {
        RecommendationEntry {
            town,
            years_since_last_major_launch: years,
            demand_score: 0.75,
            recent_market_activity: 120,
            predicted_pricing: BTreeMap::from([(FlatType::FourRoom, 420_000.0)]),
            pricing_basis: BTreeMap::from([(FlatType::FourRoom, PricingBasis::Model)]),
            rationale: String::new(),
            market_characteristics: MarketCharacteristics {
                total_transactions: 300,
                predominant_flat_types: vec![FlatType::FourRoom],
            },
        }
    }

    fn report(count: usize) -> RecommendationReport {
        let towns = [
            Town::Bedok,
            Town::Bishan,
            Town::Clementi,
            Town::Geylang,
            Town::Queenstown,
            Town::Tampines,
            Town::Yishun,
        ];
        RecommendationReport {
            as_of: YearMonth { year: 2025, month: 6 },
            entries: towns
                .iter()
                .take(count)
                .map(|&town| entry(town, 12))
                .collect(),
            summary: "Ranked towns".to_string(),
            analysis: None,
            analysis_source: AnalysisSource::None,
        }
    }

    #[test]
    fn test_summary_keeps_top_five() {
        let summary = RankingSummary::from_report(&report(7));
        assert_eq!(summary.towns.len(), NARRATIVE_TOP_ENTRIES);
        let rendered = summary.render();
        assert!(rendered.contains("1. BEDOK: 12 years since last major launch"));
        assert!(rendered.contains("4 ROOM: estimated BTO price $420000"));
        assert!(!rendered.contains("YISHUN"));
    }

    #[test]
    fn test_llm_generator_uses_analyst_prompt() {
        let provider = Recording {
            reply: Ok("Bedok stands out: a long launch gap and steady resale demand.".to_string()),
            seen: Mutex::new(Vec::new()),
        };
        let generator = LlmNarrativeGenerator::new(provider);
        let text = generator
            .generate(&RankingSummary::from_report(&report(2)))
            .unwrap();
        assert!(text.starts_with("Bedok stands out"));

        let seen = generator.provider.seen.lock().unwrap();
        assert!(seen[0].starts_with(SYSTEM_PROMPT));
        assert!(seen[0].contains("BISHAN"));
    }

    #[test]
    fn test_provider_failure_is_unavailable() {
        let generator = LlmNarrativeGenerator::new(Recording {
            reply: Err(Error::operation("openai_request", "connection refused")),
            seen: Mutex::new(Vec::new()),
        });
        let err = generator
            .generate(&RankingSummary::from_report(&report(1)))
            .unwrap_err();
        assert_eq!(err.reason(), "unavailable");
    }

    #[test]
    fn test_short_or_structured_reply_is_malformed() {
        let summary = RankingSummary::from_report(&report(1));
        let short = StaticNarrative("ok".to_string()).generate(&summary);
        assert!(matches!(short, Err(NarrativeError::Malformed(_))));

        let json = StaticNarrative(format!("{{\"towns\": [\"BEDOK\"], \"pad\": \"{}\"}}", "x".repeat(40)))
            .generate(&summary);
        assert!(matches!(json, Err(NarrativeError::Malformed(_))));
    }

    #[test]
    fn test_fallback_text_is_prose() {
        assert!(check_prose(FALLBACK_ANALYSIS).is_ok());
    }
}
