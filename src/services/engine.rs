//! Async facade over the prediction, analysis and ranking services.
//!
//! Every call samples the clock once, runs its synchronous body on a blocking
//! worker under a deadline and carries a request id into the worker.

use super::aggregation::{AggregationSettings, MarketAggregator};
use super::analysis::TownAnalysisService;
use super::launch_history::{LaunchHistory, LeaseDerivedLaunchHistory, StaticLaunchHistory};
use super::narrative::{FALLBACK_ANALYSIS, LlmNarrativeGenerator, NarrativeGenerator, RankingSummary};
use super::prediction::{PredictionService, PricingPolicy};
use super::ranking::{RankingSettings, RecommendationService};
use crate::clock::{Clock, SystemClock};
use crate::config::{LaunchHistorySource, LaunchgapConfig, TimeoutsConfig};
use crate::inference::{ArtifactLoader, FileArtifactLoader, ModelHandle};
use crate::models::{
    AnalysisSource, FlatType, HealthStatus, PredictionRequest, PredictionResult,
    RecommendationReport, Town, TownProfile,
};
use crate::observability::{RequestContext, enter_request_context};
use crate::storage::{TransactionStore, open_store};
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// The produced API surface.
pub struct Engine {
    store: Arc<dyn TransactionStore>,
    model: Arc<ModelHandle>,
    loader: Arc<dyn ArtifactLoader>,
    prediction: Arc<PredictionService>,
    analysis: Arc<TownAnalysisService>,
    recommendations: Arc<RecommendationService>,
    narrative: Option<Arc<dyn NarrativeGenerator>>,
    clock: Arc<dyn Clock>,
    timeouts: TimeoutsConfig,
    default_top_n: usize,
}

/// Assembles an [`Engine`] from parts.
pub struct EngineBuilder {
    store: Arc<dyn TransactionStore>,
    model: Arc<ModelHandle>,
    loader: Option<Arc<dyn ArtifactLoader>>,
    launch_history: Option<Arc<dyn LaunchHistory>>,
    narrative: Option<Arc<dyn NarrativeGenerator>>,
    clock: Arc<dyn Clock>,
    pricing: PricingPolicy,
    aggregation: AggregationSettings,
    ranking: RankingSettings,
    timeouts: TimeoutsConfig,
    default_top_n: usize,
}

impl EngineBuilder {
    /// Starts a builder over `store` with default settings, no model and no
    /// narrative generator.
    #[must_use]
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self {
            store,
            model: Arc::new(ModelHandle::new()),
            loader: None,
            launch_history: None,
            narrative: None,
            clock: Arc::new(SystemClock),
            pricing: PricingPolicy::default(),
            aggregation: AggregationSettings::default(),
            ranking: RankingSettings::default(),
            timeouts: TimeoutsConfig::default(),
            default_top_n: 5,
        }
    }

    /// Uses a shared model handle.
    #[must_use]
    pub fn model(mut self, model: Arc<ModelHandle>) -> Self {
        self.model = model;
        self
    }

    /// Uses `loader` for [`Engine::reload_model`].
    #[must_use]
    pub fn loader(mut self, loader: Arc<dyn ArtifactLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Uses `history` for launch years. Defaults to lease-derived years.
    #[must_use]
    pub fn launch_history(mut self, history: Arc<dyn LaunchHistory>) -> Self {
        self.launch_history = Some(history);
        self
    }

    /// Attaches a narrative generator.
    #[must_use]
    pub fn narrative(mut self, generator: Arc<dyn NarrativeGenerator>) -> Self {
        self.narrative = Some(generator);
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the pricing policy.
    #[must_use]
    pub const fn pricing(mut self, policy: PricingPolicy) -> Self {
        self.pricing = policy;
        self
    }

    /// Sets aggregation settings.
    #[must_use]
    pub const fn aggregation(mut self, settings: AggregationSettings) -> Self {
        self.aggregation = settings;
        self
    }

    /// Sets ranking settings.
    #[must_use]
    pub const fn ranking(mut self, settings: RankingSettings) -> Self {
        self.ranking = settings;
        self
    }

    /// Sets per-path deadlines.
    #[must_use]
    pub const fn timeouts(mut self, timeouts: TimeoutsConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Sets the entry count used when callers pass none.
    #[must_use]
    pub const fn default_top_n(mut self, top_n: usize) -> Self {
        self.default_top_n = top_n;
        self
    }

    /// Validates settings and wires the services.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for invalid pricing or ranking settings.
    pub fn build(self) -> Result<Engine> {
        self.pricing.validate()?;
        self.ranking.validate()?;
        if self.default_top_n == 0 {
            return Err(Error::invalid_input("default_top_n", "must be at least 1"));
        }

        let aggregator = Arc::new(MarketAggregator::new(
            Arc::clone(&self.store),
            self.aggregation,
        ));
        let prediction = Arc::new(PredictionService::new(
            Arc::clone(&self.model),
            self.pricing,
        ));
        let launch_history = self.launch_history.unwrap_or_else(|| {
            Arc::new(LeaseDerivedLaunchHistory::new(Arc::clone(&aggregator)))
        });
        let recommendations = Arc::new(RecommendationService::new(
            Arc::clone(&aggregator),
            launch_history,
            Arc::clone(&prediction),
            self.ranking,
        ));
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(FileArtifactLoader::new(PathBuf::from("models"))));

        Ok(Engine {
            store: self.store,
            model: self.model,
            loader,
            prediction,
            analysis: Arc::new(TownAnalysisService::new(aggregator)),
            recommendations,
            narrative: self.narrative,
            clock: self.clock,
            timeouts: self.timeouts,
            default_top_n: self.default_top_n,
        })
    }
}

impl Engine {
    /// Starts an [`EngineBuilder`].
    #[must_use]
    pub fn builder(store: Arc<dyn TransactionStore>) -> EngineBuilder {
        EngineBuilder::new(store)
    }

    /// Builds an engine from configuration.
    ///
    /// Opens the store, imports `data.csv_path` into an empty store, loads
    /// `model.version` when set and builds the LLM provider chain. A model
    /// that fails to load leaves the engine running in degraded mode.
    ///
    /// Performs blocking I/O and may build blocking HTTP clients, so call it
    /// outside async contexts (or from `spawn_blocking`).
    ///
    /// # Errors
    ///
    /// Returns configuration, store or import errors.
    pub fn from_config(config: &LaunchgapConfig) -> Result<Self> {
        config.validate()?;

        let store = open_store(config.data.db_path.as_deref())?;
        if let Some(csv_path) = &config.data.csv_path
            && store.count()? == 0
        {
            let report = crate::io::import_csv_file(csv_path, store.as_ref())?;
            tracing::info!(
                path = %csv_path.display(),
                imported = report.imported,
                skipped = report.skipped,
                "Seeded transaction store from CSV"
            );
        }

        let mut loader = FileArtifactLoader::new(&config.model.artifact_dir);
        if let Some(digest) = &config.model.expected_sha256 {
            loader = loader.with_expected_sha256(digest);
        }
        let model = Arc::new(ModelHandle::new());
        if let Some(version) = &config.model.version
            && let Err(err) = model.reload(&loader, version)
        {
            tracing::warn!(version = %version, error = %err, "Starting without a price model");
        }

        // The derived history is the builder default, wired to its aggregator.
        let static_history = match config.launch_history.source {
            LaunchHistorySource::Static => Some(StaticLaunchHistory::new(
                config.launch_history.parsed_years()?,
            )),
            LaunchHistorySource::Derived => None,
        };

        let mut builder = EngineBuilder::new(store)
            .model(model)
            .loader(Arc::new(loader))
            .pricing(config.pricing_policy())
            .aggregation(config.aggregation_settings())
            .ranking(config.ranking_settings())
            .timeouts(config.timeouts)
            .default_top_n(config.ranking.default_top_n);
        if let Some(history) = static_history {
            builder = builder.launch_history(Arc::new(history));
        }
        if let Some(provider) = crate::llm::build_provider(&config.llm) {
            builder = builder.narrative(Arc::new(LlmNarrativeGenerator::new(provider)));
        }
        builder.build()
    }

    /// Entry count used when callers pass none.
    #[must_use]
    pub const fn default_top_n(&self) -> usize {
        self.default_top_n
    }

    /// The shared model handle.
    #[must_use]
    pub const fn model(&self) -> &Arc<ModelHandle> {
        &self.model
    }

    /// The transaction store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    /// Predicts resale and BTO prices for one flat.
    ///
    /// # Errors
    ///
    /// Returns encoding errors, [`Error::ModelUnavailable`] or
    /// [`Error::Timeout`].
    pub async fn predict(&self, request: PredictionRequest) -> Result<PredictionResult> {
        let as_of = self.clock.today();
        let service = Arc::clone(&self.prediction);
        self.run(
            RequestContext::new("predict"),
            self.timeouts.predict(),
            move || service.predict(&request, as_of),
        )
        .await
    }

    /// Profiles one town's resale market.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTown`], [`Error::InsufficientData`] or
    /// [`Error::Timeout`].
    pub async fn analyze(&self, town: &str) -> Result<TownProfile> {
        let name = town.to_string();
        let service = Arc::clone(&self.analysis);
        self.run(
            RequestContext::new("analyze"),
            self.timeouts.analysis(),
            move || service.analyze(&name).map(|profile| (*profile).clone()),
        )
        .await
    }

    /// Ranks towns for the next launch and attaches a narrative.
    ///
    /// The narrative never fails the call: generator errors and timeouts
    /// produce [`FALLBACK_ANALYSIS`].
    ///
    /// # Errors
    ///
    /// Returns store errors or [`Error::Timeout`].
    pub async fn recommend(&self, top_n: usize) -> Result<RecommendationReport> {
        let ctx = RequestContext::new("recommend");
        let as_of = self.clock.today();
        let service = Arc::clone(&self.recommendations);
        let mut report = self
            .run(ctx.clone(), self.timeouts.ranking(), move || {
                service.recommend(top_n, as_of)
            })
            .await?;

        self.attach_narrative(&ctx, &mut report).await;
        metrics::counter!(
            "recommendations_total",
            "analysis_source" => analysis_label(report.analysis_source)
        )
        .increment(1);
        Ok(report)
    }

    /// Towns present in the store, sorted.
    ///
    /// # Errors
    ///
    /// Returns store errors or [`Error::Timeout`].
    pub async fn list_towns(&self) -> Result<Vec<Town>> {
        let store = Arc::clone(&self.store);
        self.run(
            RequestContext::new("list_towns"),
            self.timeouts.analysis(),
            move || Ok(store.distinct_towns()?.into_iter().collect()),
        )
        .await
    }

    /// Flat types present in the store, sorted.
    ///
    /// # Errors
    ///
    /// Returns store errors or [`Error::Timeout`].
    pub async fn list_flat_types(&self) -> Result<Vec<FlatType>> {
        let store = Arc::clone(&self.store);
        self.run(
            RequestContext::new("list_flat_types"),
            self.timeouts.analysis(),
            move || Ok(store.distinct_flat_types()?.into_iter().collect()),
        )
        .await
    }

    /// Model and data health. Never fails; an uncountable store reports
    /// `transactions: None`.
    pub async fn health(&self) -> HealthStatus {
        let store = Arc::clone(&self.store);
        let transactions = match self
            .run(
                RequestContext::new("health"),
                self.timeouts.analysis(),
                move || store.count(),
            )
            .await
        {
            Ok(count) => Some(count),
            Err(err) => {
                tracing::warn!(error = %err, "Health check could not count transactions");
                None
            },
        };

        let artifact = self.model.current().ok();
        HealthStatus {
            status: if artifact.is_some() { "ok" } else { "degraded" }.to_string(),
            model_loaded: artifact.is_some(),
            model_version: artifact.as_ref().map(|a| a.version().to_string()),
            feature_count: artifact.as_ref().map_or(0, |a| a.feature_count()),
            artifact_digest: artifact.as_ref().map(|a| a.digest().to_string()),
            transactions,
        }
    }

    /// Loads `version` through the loader and swaps it in.
    ///
    /// The previous artifact keeps serving if the load fails.
    ///
    /// # Errors
    ///
    /// Returns loader errors or [`Error::Timeout`].
    pub async fn reload_model(&self, version: &str) -> Result<String> {
        let model = Arc::clone(&self.model);
        let loader = Arc::clone(&self.loader);
        let reference = version.to_string();
        let artifact = self
            .run(
                RequestContext::new("reload_model"),
                self.timeouts.analysis(),
                move || model.reload(loader.as_ref(), &reference),
            )
            .await?;
        Ok(artifact.version().to_string())
    }

    async fn run<T, F>(&self, ctx: RequestContext, deadline: Duration, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let operation = ctx.operation();
        let span = ctx.span();
        let worker_span = span.clone();
        let worker_ctx = ctx.clone();
        let start = Instant::now();

        let task = tokio::task::spawn_blocking(move || {
            let _context = enter_request_context(worker_ctx);
            let _entered = worker_span.enter();
            job()
        });

        // A timed-out worker is detached and runs to completion in the background.
        let result = match tokio::time::timeout(deadline, task).instrument(span).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(Error::operation(operation, format!("worker failed: {join_err}"))),
            Err(_) => {
                tracing::warn!(
                    request_id = ctx.request_id(),
                    operation,
                    deadline_ms = deadline.as_millis(),
                    "Engine call timed out"
                );
                Err(Error::Timeout {
                    operation: operation.to_string(),
                    elapsed_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                })
            },
        };

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::counter!("engine_requests_total", "operation" => operation, "status" => status)
            .increment(1);
        metrics::histogram!("engine_request_duration_ms", "operation" => operation)
            .record(start.elapsed().as_secs_f64() * 1000.0);
        result
    }

    async fn attach_narrative(&self, ctx: &RequestContext, report: &mut RecommendationReport) {
        let outcome = match &self.narrative {
            None => Err("unconfigured"),
            Some(_) if report.entries.is_empty() => Err("no_entries"),
            Some(generator) => {
                let generator = Arc::clone(generator);
                let summary = RankingSummary::from_report(report);
                let worker_ctx = ctx.clone();
                let span = ctx.span();
                let task = tokio::task::spawn_blocking(move || {
                    let _context = enter_request_context(worker_ctx);
                    let _entered = span.enter();
                    generator.generate(&summary)
                });
                match tokio::time::timeout(self.timeouts.narrative(), task).await {
                    Ok(Ok(Ok(text))) => Ok(text),
                    Ok(Ok(Err(err))) => {
                        tracing::warn!(request_id = ctx.request_id(), error = %err, "Narrative failed");
                        Err(err.reason())
                    },
                    Ok(Err(join_err)) => {
                        tracing::warn!(request_id = ctx.request_id(), error = %join_err, "Narrative worker failed");
                        Err("worker_failed")
                    },
                    Err(_) => {
                        tracing::warn!(request_id = ctx.request_id(), "Narrative timed out");
                        Err("timeout")
                    },
                }
            },
        };

        match outcome {
            Ok(text) => {
                report.analysis = Some(text);
                report.analysis_source = AnalysisSource::Generated;
            },
            Err(reason) => {
                metrics::counter!("narrative_fallback_total", "reason" => reason).increment(1);
                report.analysis = Some(FALLBACK_ANALYSIS.to_string());
                report.analysis_source = AnalysisSource::Fallback;
            },
        }
    }
}

const fn analysis_label(source: AnalysisSource) -> &'static str {
    match source {
        AnalysisSource::Generated => "generated",
        AnalysisSource::Fallback => "fallback",
        AnalysisSource::None => "none",
    }
}
