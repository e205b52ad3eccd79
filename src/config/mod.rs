//! Configuration management.
//!
//! Values are layered: built-in defaults, then a TOML file, then `LAUNCHGAP_*`
//! environment variables. [`LaunchgapConfig::validate`] runs after layering.

mod env;

use crate::models::Town;
use crate::observability::LogFormat;
use crate::services::{AggregationSettings, PricingPolicy, RankingSettings};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for launchgap.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaunchgapConfig {
    /// Transaction data sources.
    pub data: DataConfig,
    /// Model artifact location.
    pub model: ModelConfig,
    /// BTO discount and affordability thresholds.
    pub pricing: PricingConfig,
    /// Profile aggregation and caching.
    pub aggregation: AggregationConfig,
    /// Recommendation ranking.
    pub ranking: RankingConfig,
    /// Per-path deadlines.
    pub timeouts: TimeoutsConfig,
    /// Launch-history source.
    pub launch_history: LaunchHistoryConfig,
    /// Narrative LLM providers.
    pub llm: LlmConfig,
    /// Log output.
    pub logging: LoggingConfig,
    /// Prometheus exporter.
    pub metrics: MetricsConfig,
}

/// `[data]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// `SQLite` database file. An in-memory store is used when unset.
    pub db_path: Option<PathBuf>,
    /// Resale CSV imported at startup when the store is empty.
    pub csv_path: Option<PathBuf>,
}

/// `[model]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Directory holding `<version>.json` artifacts.
    pub artifact_dir: PathBuf,
    /// Version or path loaded at startup.
    pub version: Option<String>,
    /// Expected SHA-256 of the artifact file, lowercase hex.
    pub expected_sha256: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("models"),
            version: None,
            expected_sha256: None,
        }
    }
}

/// `[pricing]` section.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricingConfig {
    /// Fraction taken off the resale estimate to get the BTO estimate.
    pub discount_factor: f64,
    /// Upper bound of the lower-income band.
    pub lower_max: f64,
    /// Upper bound of the middle-income band.
    pub middle_max: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        let policy = PricingPolicy::default();
        Self {
            discount_factor: policy.discount_factor,
            lower_max: policy.lower_max,
            middle_max: policy.middle_max,
        }
    }
}

/// `[aggregation]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregationConfig {
    /// Months of data counted as recent.
    pub recent_window_months: u32,
    /// Profile cache lifetime in seconds.
    pub cache_ttl_secs: u64,
    /// Maximum cached entries.
    pub cache_capacity: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        let settings = AggregationSettings::default();
        Self {
            recent_window_months: settings.recent_window_months,
            cache_ttl_secs: settings.cache_ttl.as_secs(),
            cache_capacity: settings.cache_capacity,
        }
    }
}

/// `[ranking]` section.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankingConfig {
    /// Entries returned when the caller does not say.
    pub default_top_n: usize,
    /// Years at which the launch-gap term saturates.
    pub long_wait_years: f64,
    /// Weight of the launch-gap term.
    pub years_weight: f64,
    /// Weight of the market-activity term.
    pub activity_weight: f64,
    /// Minimum transactions for a candidate town.
    pub min_total_transactions: usize,
    /// Minimum launch gap for a candidate town.
    pub min_years_since_launch: u32,
    /// Flat types priced per entry.
    pub predominant_k: usize,
    /// Concurrent pricing workers.
    pub pricing_concurrency: usize,
    /// Price from market medians when the model cannot.
    pub market_median_fallback: bool,
    /// Recent sales needed to trust the recent median.
    pub min_recent_for_median: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        let settings = RankingSettings::default();
        Self {
            default_top_n: 5,
            long_wait_years: settings.long_wait_years,
            years_weight: settings.years_weight,
            activity_weight: settings.activity_weight,
            min_total_transactions: settings.min_total_transactions,
            min_years_since_launch: settings.min_years_since_launch,
            predominant_k: settings.predominant_k,
            pricing_concurrency: settings.pricing_concurrency,
            market_median_fallback: settings.market_median_fallback,
            min_recent_for_median: settings.min_recent_for_median,
        }
    }
}

/// `[timeouts]` section, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutsConfig {
    /// Single prediction.
    pub predict_ms: u64,
    /// Single-town analysis.
    pub analysis_ms: u64,
    /// Full recommendation ranking.
    pub ranking_ms: u64,
    /// Narrative generation.
    pub narrative_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            predict_ms: 5_000,
            analysis_ms: 10_000,
            ranking_ms: 30_000,
            narrative_ms: 20_000,
        }
    }
}

/// Where launch years come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchHistorySource {
    /// Years listed under `[launch_history.years]`.
    Static,
    /// Newest lease commencement year seen per town.
    #[default]
    Derived,
}

/// `[launch_history]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaunchHistoryConfig {
    /// Source of launch years.
    pub source: LaunchHistorySource,
    /// Town name to year of last major launch.
    pub years: BTreeMap<String, i32>,
}

impl LaunchHistoryConfig {
    /// Parses the configured town names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first unknown town.
    pub fn parsed_years(&self) -> Result<BTreeMap<Town, i32>> {
        self.years
            .iter()
            .map(|(name, &year)| {
                Town::parse(name)
                    .map(|town| (town, year))
                    .ok_or_else(|| {
                        Error::invalid_input("launch_history.years", format!("unknown town '{name}'"))
                    })
            })
            .collect()
    }
}

/// `[llm]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    /// Whether reports request a generated narrative.
    pub enabled: bool,
    /// Providers tried in order (`openai`, `perplexity`).
    pub providers: Vec<String>,
    /// `OpenAI` model override.
    pub openai_model: Option<String>,
    /// `OpenAI` endpoint override.
    pub openai_endpoint: Option<String>,
    /// Perplexity model override.
    pub perplexity_model: Option<String>,
    /// Perplexity endpoint override.
    pub perplexity_endpoint: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Completion length cap.
    pub max_tokens: Option<u32>,
    /// HTTP request timeout.
    pub timeout_ms: Option<u64>,
    /// HTTP connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Retries for timed-out calls.
    pub max_retries: Option<u32>,
    /// Backoff between retries.
    pub retry_backoff_ms: Option<u64>,
    /// Consecutive failures before the breaker opens.
    pub breaker_failure_threshold: Option<u32>,
    /// How long the breaker stays open.
    pub breaker_reset_ms: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            providers: vec!["openai".to_string(), "perplexity".to_string()],
            openai_model: None,
            openai_endpoint: None,
            perplexity_model: None,
            perplexity_endpoint: None,
            temperature: None,
            max_tokens: None,
            timeout_ms: None,
            connect_timeout_ms: None,
            max_retries: None,
            retry_backoff_ms: None,
            breaker_failure_threshold: None,
            breaker_reset_ms: None,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Optional log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// `[metrics]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder.
    pub enabled: bool,
    /// Serve `/metrics` on this port.
    pub port: Option<u16>,
}

impl LaunchgapConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] for malformed TOML or unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::operation("parse_config_file", e))
    }

    /// Loads a file, applies environment overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value is
    /// invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_config_file", format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&contents)?.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks, in order: `LAUNCHGAP_CONFIG_PATH`, the platform config dir
    /// (`<config_dir>/launchgap/config.toml`) and `~/.config/launchgap/config.toml`.
    /// Falls back to defaults with environment overrides when none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but is invalid.
    pub fn load_default() -> Result<Self> {
        if let Ok(path) = std::env::var("LAUNCHGAP_CONFIG_PATH")
            && !path.trim().is_empty()
        {
            return Self::load_from_file(Path::new(path.trim()));
        }

        if let Some(base_dirs) = directories::BaseDirs::new() {
            let candidates = [
                base_dirs.config_dir().join("launchgap").join("config.toml"),
                base_dirs
                    .home_dir()
                    .join(".config")
                    .join("launchgap")
                    .join("config.toml"),
            ];
            if let Some(path) = candidates.iter().find(|p| p.exists()) {
                tracing::debug!(path = %path.display(), "Loading config file");
                return Self::load_from_file(path);
            }
        }

        let config = Self::default().with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies `LAUNCHGAP_*` environment variables.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        env::apply(self, |key| std::env::var(key).ok())
    }

    /// Checks cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.pricing_policy().validate()?;
        self.ranking_settings().validate()?;
        if self.ranking.default_top_n == 0 {
            return Err(Error::invalid_input("ranking.default_top_n", "must be at least 1"));
        }
        if self.aggregation.recent_window_months == 0 {
            return Err(Error::invalid_input(
                "aggregation.recent_window_months",
                "must be at least 1",
            ));
        }
        let timeouts = [
            ("timeouts.predict_ms", self.timeouts.predict_ms),
            ("timeouts.analysis_ms", self.timeouts.analysis_ms),
            ("timeouts.ranking_ms", self.timeouts.ranking_ms),
            ("timeouts.narrative_ms", self.timeouts.narrative_ms),
        ];
        if let Some((field, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
            return Err(Error::invalid_input(*field, "must be positive"));
        }
        let years = self.launch_history.parsed_years()?;
        if self.launch_history.source == LaunchHistorySource::Static && years.is_empty() {
            return Err(Error::invalid_input(
                "launch_history.years",
                "static source needs at least one town",
            ));
        }
        if let Some(temperature) = self.llm.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(Error::invalid_input(
                "llm.temperature",
                format!("{temperature} outside [0, 2]"),
            ));
        }
        Ok(())
    }

    /// Pricing policy from `[pricing]`.
    #[must_use]
    pub const fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy {
            discount_factor: self.pricing.discount_factor,
            lower_max: self.pricing.lower_max,
            middle_max: self.pricing.middle_max,
        }
    }

    /// Aggregation settings from `[aggregation]`.
    #[must_use]
    pub const fn aggregation_settings(&self) -> AggregationSettings {
        AggregationSettings {
            recent_window_months: self.aggregation.recent_window_months,
            cache_ttl: Duration::from_secs(self.aggregation.cache_ttl_secs),
            cache_capacity: self.aggregation.cache_capacity,
        }
    }

    /// Ranking settings from `[ranking]`.
    #[must_use]
    pub const fn ranking_settings(&self) -> RankingSettings {
        RankingSettings {
            long_wait_years: self.ranking.long_wait_years,
            years_weight: self.ranking.years_weight,
            activity_weight: self.ranking.activity_weight,
            min_total_transactions: self.ranking.min_total_transactions,
            min_years_since_launch: self.ranking.min_years_since_launch,
            predominant_k: self.ranking.predominant_k,
            pricing_concurrency: self.ranking.pricing_concurrency,
            market_median_fallback: self.ranking.market_median_fallback,
            min_recent_for_median: self.ranking.min_recent_for_median,
        }
    }
}

impl TimeoutsConfig {
    /// Prediction deadline.
    #[must_use]
    pub const fn predict(&self) -> Duration {
        Duration::from_millis(self.predict_ms)
    }

    /// Analysis deadline.
    #[must_use]
    pub const fn analysis(&self) -> Duration {
        Duration::from_millis(self.analysis_ms)
    }

    /// Ranking deadline.
    #[must_use]
    pub const fn ranking(&self) -> Duration {
        Duration::from_millis(self.ranking_ms)
    }

    /// Narrative deadline.
    #[must_use]
    pub const fn narrative(&self) -> Duration {
        Duration::from_millis(self.narrative_ms)
    }
}
