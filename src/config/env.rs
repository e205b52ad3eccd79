//! `LAUNCHGAP_*` environment overrides.
//!
//! Values that fail to parse are ignored with a warning so a typo in the
//! environment never hides a valid file setting.

use super::{LaunchHistorySource, LaunchgapConfig};
use crate::observability::LogFormat;
use std::path::PathBuf;
use std::str::FromStr;

/// Applies overrides read through `lookup`.
pub fn apply<F>(mut config: LaunchgapConfig, lookup: F) -> LaunchgapConfig
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(path) = get("LAUNCHGAP_DB_PATH") {
        config.data.db_path = Some(PathBuf::from(path));
    }
    if let Some(path) = get("LAUNCHGAP_CSV_PATH") {
        config.data.csv_path = Some(PathBuf::from(path));
    }
    if let Some(dir) = get("LAUNCHGAP_MODEL_DIR") {
        config.model.artifact_dir = PathBuf::from(dir);
    }
    if let Some(version) = get("LAUNCHGAP_MODEL_VERSION") {
        config.model.version = Some(version);
    }
    if let Some(digest) = get("LAUNCHGAP_MODEL_SHA256") {
        config.model.expected_sha256 = Some(digest.to_lowercase());
    }

    set_parsed(&get, "LAUNCHGAP_DISCOUNT_FACTOR", &mut config.pricing.discount_factor);
    set_parsed(&get, "LAUNCHGAP_LOWER_MAX", &mut config.pricing.lower_max);
    set_parsed(&get, "LAUNCHGAP_MIDDLE_MAX", &mut config.pricing.middle_max);

    set_parsed(
        &get,
        "LAUNCHGAP_RECENT_WINDOW_MONTHS",
        &mut config.aggregation.recent_window_months,
    );
    set_parsed(&get, "LAUNCHGAP_CACHE_TTL_SECS", &mut config.aggregation.cache_ttl_secs);

    set_parsed(&get, "LAUNCHGAP_TOP_N", &mut config.ranking.default_top_n);
    set_parsed(&get, "LAUNCHGAP_YEARS_WEIGHT", &mut config.ranking.years_weight);
    set_parsed(&get, "LAUNCHGAP_ACTIVITY_WEIGHT", &mut config.ranking.activity_weight);
    set_parsed(
        &get,
        "LAUNCHGAP_PRICING_CONCURRENCY",
        &mut config.ranking.pricing_concurrency,
    );

    set_parsed(&get, "LAUNCHGAP_PREDICT_TIMEOUT_MS", &mut config.timeouts.predict_ms);
    set_parsed(&get, "LAUNCHGAP_ANALYSIS_TIMEOUT_MS", &mut config.timeouts.analysis_ms);
    set_parsed(&get, "LAUNCHGAP_RANKING_TIMEOUT_MS", &mut config.timeouts.ranking_ms);
    set_parsed(&get, "LAUNCHGAP_NARRATIVE_TIMEOUT_MS", &mut config.timeouts.narrative_ms);

    if let Some(source) = get("LAUNCHGAP_LAUNCH_HISTORY") {
        match source.to_lowercase().as_str() {
            "static" => config.launch_history.source = LaunchHistorySource::Static,
            "derived" => config.launch_history.source = LaunchHistorySource::Derived,
            other => tracing::warn!(value = other, "Ignoring LAUNCHGAP_LAUNCH_HISTORY"),
        }
    }

    if let Some(enabled) = get("LAUNCHGAP_LLM_ENABLED").and_then(|v| parse_bool(&v)) {
        config.llm.enabled = enabled;
    }
    if let Some(providers) = get("LAUNCHGAP_LLM_PROVIDERS") {
        config.llm.providers = providers
            .split(',')
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
    }

    if let Some(level) = get("LAUNCHGAP_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get("LAUNCHGAP_LOG_FORMAT") {
        match LogFormat::parse(&format) {
            Some(format) => config.logging.format = format,
            None => tracing::warn!(value = %format, "Ignoring LAUNCHGAP_LOG_FORMAT"),
        }
    }
    if let Some(file) = get("LAUNCHGAP_LOG_FILE") {
        config.logging.file = Some(PathBuf::from(file));
    }

    if let Some(enabled) = get("LAUNCHGAP_METRICS_ENABLED").and_then(|v| parse_bool(&v)) {
        config.metrics.enabled = enabled;
    }
    if let Some(port) = get("LAUNCHGAP_METRICS_PORT").and_then(|v| v.parse::<u16>().ok()) {
        config.metrics.port = Some(port);
    }

    config
}

fn set_parsed<T, G>(get: &G, key: &str, slot: &mut T)
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        match raw.parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparseable override"),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn apply_vars(vars: &[(&str, &str)]) -> LaunchgapConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        apply(LaunchgapConfig::default(), |key| vars.get(key).cloned())
    }

    #[test]
    fn test_overrides_apply() {
        let config = apply_vars(&[
            ("LAUNCHGAP_DISCOUNT_FACTOR", "0.3"),
            ("LAUNCHGAP_TOP_N", "8"),
            ("LAUNCHGAP_LOG_FORMAT", "JSON"),
            ("LAUNCHGAP_LLM_ENABLED", "yes"),
            ("LAUNCHGAP_LLM_PROVIDERS", "Perplexity, openai"),
            ("LAUNCHGAP_METRICS_PORT", "9100"),
            ("LAUNCHGAP_LAUNCH_HISTORY", "static"),
            ("LAUNCHGAP_MODEL_SHA256", "ABCDEF"),
        ]);

        assert!((config.pricing.discount_factor - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.ranking.default_top_n, 8);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.llm.enabled);
        assert_eq!(config.llm.providers, vec!["perplexity", "openai"]);
        assert_eq!(config.metrics.port, Some(9100));
        assert_eq!(config.launch_history.source, LaunchHistorySource::Static);
        assert_eq!(config.model.expected_sha256.as_deref(), Some("abcdef"));
    }

    #[test]
    fn test_bad_values_are_ignored() {
        let config = apply_vars(&[
            ("LAUNCHGAP_DISCOUNT_FACTOR", "twenty percent"),
            ("LAUNCHGAP_METRICS_ENABLED", "maybe"),
            ("LAUNCHGAP_LOG_FORMAT", "xml"),
            ("LAUNCHGAP_DB_PATH", "   "),
        ]);
        assert_eq!(config, LaunchgapConfig::default());
    }
}
