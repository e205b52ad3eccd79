//! Launch-gap scoring and recommendation ranking.
//!
//! A town ranks high when it has gone a long time without a major launch and
//! still shows an active resale market. Scores are relative to the candidates
//! of one pass: the activity term is normalised by the busiest candidate.

use super::aggregation::MarketAggregator;
use super::launch_history::LaunchHistory;
use super::prediction::PredictionService;
use crate::models::{
    AnalysisSource, FlatType, MarketCharacteristics, PredictionRequest, PredictionResult,
    PricingBasis, RecommendationEntry, RecommendationReport, Town, TownProfile, YearMonth,
};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Ranking settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingSettings {
    /// Years without a launch at which the gap term saturates.
    pub long_wait_years: f64,
    /// Weight of the launch-gap term.
    pub years_weight: f64,
    /// Weight of the market-activity term.
    pub activity_weight: f64,
    /// Towns with fewer transactions are not candidates.
    pub min_total_transactions: usize,
    /// Towns with a shorter gap are not candidates.
    pub min_years_since_launch: u32,
    /// Flat types priced per entry.
    pub predominant_k: usize,
    /// Concurrent pricing workers.
    pub pricing_concurrency: usize,
    /// Price from market medians when the model cannot.
    pub market_median_fallback: bool,
    /// Recent sales needed before the recent median is trusted over the
    /// all-time flat-type median.
    pub min_recent_for_median: usize,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            long_wait_years: 10.0,
            years_weight: 0.6,
            activity_weight: 0.4,
            min_total_transactions: 0,
            min_years_since_launch: 0,
            predominant_k: 3,
            pricing_concurrency: 4,
            market_median_fallback: true,
            min_recent_for_median: 10,
        }
    }
}

impl RankingSettings {
    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for negative or all-zero weights, a
    /// non-positive saturation point, or zero `predominant_k`/concurrency.
    pub fn validate(&self) -> Result<()> {
        let weights_ok = self.years_weight >= 0.0
            && self.activity_weight >= 0.0
            && self.years_weight + self.activity_weight > 0.0
            && (self.years_weight + self.activity_weight).is_finite();
        if !weights_ok {
            return Err(Error::invalid_input(
                "ranking.weights",
                "weights must be non-negative with a positive sum",
            ));
        }
        if !(self.long_wait_years.is_finite() && self.long_wait_years > 0.0) {
            return Err(Error::invalid_input(
                "ranking.long_wait_years",
                format!("{} must be positive", self.long_wait_years),
            ));
        }
        if self.predominant_k == 0 {
            return Err(Error::invalid_input("ranking.predominant_k", "must be at least 1"));
        }
        if self.pricing_concurrency == 0 {
            return Err(Error::invalid_input(
                "ranking.pricing_concurrency",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Weights scaled to sum to 1.
    #[must_use]
    pub fn normalized_weights(&self) -> (f64, f64) {
        let total = self.years_weight + self.activity_weight;
        (self.years_weight / total, self.activity_weight / total)
    }
}

/// Demand score in `[0, 1]`.
///
/// Non-decreasing in `years` for fixed activity and in `activity` for fixed
/// years. The activity term is 0 when `max_activity` is 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn demand_score(
    years: u32,
    activity: usize,
    max_activity: usize,
    settings: &RankingSettings,
) -> f64 {
    let (w_years, w_activity) = settings.normalized_weights();
    let gap = (f64::from(years) / settings.long_wait_years).min(1.0);
    let market = if max_activity == 0 {
        0.0
    } else {
        (activity as f64 / max_activity as f64).min(1.0)
    };
    w_years.mul_add(gap, w_activity * market).clamp(0.0, 1.0)
}

/// Deterministic rationale text for an entry.
#[must_use]
pub fn rationale(years: u32, recent_transactions: usize) -> String {
    format!(
        "No major launches for {years} years; active resale market ({recent_transactions} recent transactions)"
    )
}

#[derive(Debug, Clone)]
struct Candidate {
    town: Town,
    years: u32,
    profile: TownProfile,
    score: f64,
}

#[derive(Debug, Clone)]
struct PricingJob {
    entry: usize,
    flat_type: FlatType,
    request: PredictionRequest,
}

/// Ranks towns for the next launch.
pub struct RecommendationService {
    aggregator: Arc<MarketAggregator>,
    history: Arc<dyn LaunchHistory>,
    prediction: Arc<PredictionService>,
    settings: RankingSettings,
}

impl RecommendationService {
    /// Creates a ranker.
    #[must_use]
    pub fn new(
        aggregator: Arc<MarketAggregator>,
        history: Arc<dyn LaunchHistory>,
        prediction: Arc<PredictionService>,
        settings: RankingSettings,
    ) -> Self {
        Self {
            aggregator,
            history,
            prediction,
            settings,
        }
    }

    /// Settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &RankingSettings {
        &self.settings
    }

    /// Produces up to `top_n` ranked entries.
    ///
    /// Towns without launch history or transactions are skipped. Pricing
    /// failures never fail the report. A `top_n` of 0 yields an empty report.
    ///
    /// # Errors
    ///
    /// Returns an error from the store or the launch history.
    #[instrument(skip(self), fields(operation = "recommend", as_of = %as_of))]
    pub fn recommend(&self, top_n: usize, as_of: YearMonth) -> Result<RecommendationReport> {
        if top_n == 0 {
            return Ok(empty_report(as_of, "no entries were requested"));
        }
        let start = Instant::now();

        let profiles = self.aggregator.aggregate_all()?;
        let known = self.history.known_towns()?;

        let mut candidates = Vec::new();
        for town in known {
            let Some(launch_year) = self.history.last_major_launch(town)? else {
                continue;
            };
            let Some(profile) = profiles.get(&town) else {
                tracing::debug!(town = %town, "Skipping town without transactions");
                continue;
            };
            let years = u32::try_from((as_of.year - launch_year).max(0)).unwrap_or(0);
            if profile.total_transactions < self.settings.min_total_transactions
                || years < self.settings.min_years_since_launch
            {
                continue;
            }
            candidates.push(Candidate {
                town,
                years,
                profile: profile.clone(),
                score: 0.0,
            });
        }

        if candidates.is_empty() {
            let reason = if profiles.is_empty() {
                "no transaction data is available"
            } else {
                "no town with launch history met the eligibility filters"
            };
            return Ok(empty_report(as_of, reason));
        }

        let max_activity = candidates
            .iter()
            .map(|c| c.profile.price_trend.recent_transactions)
            .max()
            .unwrap_or(0);
        for candidate in &mut candidates {
            candidate.score = demand_score(
                candidate.years,
                candidate.profile.price_trend.recent_transactions,
                max_activity,
                &self.settings,
            );
        }
        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.profile.total_transactions.cmp(&a.profile.total_transactions))
                .then_with(|| a.town.as_str().cmp(b.town.as_str()))
        });

        let candidate_count = candidates.len();
        candidates.truncate(top_n);

        let mut entries: Vec<RecommendationEntry> =
            candidates.iter().map(|c| self.entry(c)).collect();
        self.price_entries(&candidates, &mut entries, as_of);

        let summary = format!(
            "Ranked {} of {candidate_count} candidate towns (top: {})",
            entries.len(),
            candidates[0].town
        );
        metrics::histogram!("ranking_duration_ms").record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            ranked = entries.len(),
            candidates = candidate_count,
            elapsed_ms = start.elapsed().as_millis(),
            "Ranked launch candidates"
        );

        Ok(RecommendationReport {
            as_of,
            entries,
            summary,
            analysis: None,
            analysis_source: AnalysisSource::None,
        })
    }

    fn entry(&self, candidate: &Candidate) -> RecommendationEntry {
        let activity = candidate.profile.price_trend.recent_transactions;
        RecommendationEntry {
            town: candidate.town,
            years_since_last_major_launch: candidate.years,
            demand_score: candidate.score,
            recent_market_activity: activity,
            predicted_pricing: BTreeMap::new(),
            pricing_basis: BTreeMap::new(),
            rationale: rationale(candidate.years, activity),
            market_characteristics: MarketCharacteristics {
                total_transactions: candidate.profile.total_transactions,
                predominant_flat_types: candidate
                    .profile
                    .predominant_flat_types(self.settings.predominant_k),
            },
        }
    }

    /// Prices the predominant flat types of every entry on scoped workers.
    fn price_entries(
        &self,
        candidates: &[Candidate],
        entries: &mut [RecommendationEntry],
        as_of: YearMonth,
    ) {
        let jobs: Vec<PricingJob> = entries
            .iter()
            .enumerate()
            .flat_map(|(index, entry)| {
                let profile = &candidates[index].profile;
                entry
                    .market_characteristics
                    .predominant_flat_types
                    .iter()
                    .filter_map(move |flat_type| {
                        let unit = profile.representative_units.get(flat_type)?;
                        Some(PricingJob {
                            entry: index,
                            flat_type: *flat_type,
                            request: PredictionRequest {
                                town: entry.town.to_string(),
                                flat_type: flat_type.to_string(),
                                floor_area_sqm: unit.floor_area_sqm,
                                storey: unit.storey,
                                lease_commence_year: unit.lease_commence_year,
                            },
                        })
                    })
            })
            .collect();

        let outcomes = self.run_pricing_jobs(&jobs, as_of);

        for (job, outcome) in jobs.iter().zip(outcomes) {
            let entry = &mut entries[job.entry];
            match outcome {
                Some(Ok(result)) => {
                    entry
                        .predicted_pricing
                        .insert(job.flat_type, result.predicted_bto_price);
                    entry.pricing_basis.insert(job.flat_type, PricingBasis::Model);
                },
                failure => {
                    let error = match failure {
                        Some(Err(e)) => e.to_string(),
                        _ => "pricing worker panicked".to_string(),
                    };
                    tracing::warn!(
                        town = %entry.town,
                        flat_type = %job.flat_type,
                        error = %error,
                        "Model pricing failed"
                    );
                    metrics::counter!("ranking_pricing_failures_total").increment(1);
                    if self.settings.market_median_fallback
                        && let Some(price) =
                            self.market_median_price(&candidates[job.entry].profile, job.flat_type)
                    {
                        entry.predicted_pricing.insert(job.flat_type, price);
                        entry
                            .pricing_basis
                            .insert(job.flat_type, PricingBasis::MarketMedian);
                    }
                },
            }
        }
    }

    /// Runs jobs with at most `pricing_concurrency` scoped workers.
    ///
    /// Outcomes are returned in job order; `None` marks a job whose worker
    /// panicked.
    fn run_pricing_jobs(
        &self,
        jobs: &[PricingJob],
        as_of: YearMonth,
    ) -> Vec<Option<Result<PredictionResult>>> {
        let workers = self.settings.pricing_concurrency.min(jobs.len());
        let next = AtomicUsize::new(0);
        let mut outcomes: Vec<Option<Result<PredictionResult>>> =
            (0..jobs.len()).map(|_| None).collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut done = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            let Some(job) = jobs.get(index) else {
                                break;
                            };
                            done.push((index, self.prediction.predict(&job.request, as_of)));
                        }
                        done
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(done) => {
                        for (index, outcome) in done {
                            outcomes[index] = Some(outcome);
                        }
                    },
                    Err(_) => tracing::error!("Pricing worker panicked"),
                }
            }
        });

        outcomes
    }

    fn market_median_price(&self, profile: &TownProfile, flat_type: FlatType) -> Option<f64> {
        let recent = profile
            .price_trend
            .recent_by_flat_type
            .get(&flat_type)
            .filter(|trend| trend.recent_transactions >= self.settings.min_recent_for_median)
            .map(|trend| trend.recent_median);
        let resale = recent.or_else(|| profile.price_ranges.get(&flat_type).map(|r| r.median))?;
        Some(self.prediction.policy().bto_price(resale))
    }
}

fn empty_report(as_of: YearMonth, reason: &str) -> RecommendationReport {
    tracing::info!(reason, "No towns qualified for recommendation");
    RecommendationReport {
        as_of,
        entries: Vec::new(),
        summary: format!("No towns qualified for recommendation: {reason}"),
        analysis: None,
        analysis_source: AnalysisSource::None,
    }
}
