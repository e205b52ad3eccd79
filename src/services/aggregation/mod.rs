//! Market aggregation.
//!
//! Turns raw transactions into per-town [`TownProfile`]s. The recency window
//! is anchored at the latest transaction month in the whole store, not at the
//! wall clock, so a dataset that stops in 2024 still has a "recent" year.

mod builder;
mod cache;
pub mod stats;

pub use builder::build_profile;
pub use cache::{CachedProfiles, ProfileCache, ProfileKey, ProfileMap};

use crate::models::{Town, TownProfile, TransactionRecord, YearMonth};
use crate::storage::TransactionStore;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Aggregation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationSettings {
    /// Length of the recency window, in months of data.
    pub recent_window_months: u32,
    /// Lifetime of cached profiles.
    pub cache_ttl: Duration,
    /// Maximum cached entries.
    pub cache_capacity: usize,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            recent_window_months: 12,
            cache_ttl: Duration::from_secs(3600),
            cache_capacity: 64,
        }
    }
}

/// Computes and memoizes town profiles.
pub struct MarketAggregator {
    store: Arc<dyn TransactionStore>,
    settings: AggregationSettings,
    cache: ProfileCache,
}

impl MarketAggregator {
    /// Creates an aggregator over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TransactionStore>, settings: AggregationSettings) -> Self {
        Self {
            store,
            cache: ProfileCache::new(settings.cache_capacity, settings.cache_ttl),
            settings,
        }
    }

    /// Settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    /// Last month outside the recency window: records strictly after it are recent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientData`] if the store is empty.
    pub fn recent_cutoff(&self) -> Result<YearMonth> {
        let latest = self
            .store
            .latest_transaction_date()?
            .ok_or_else(|| Error::InsufficientData("transaction store is empty".to_string()))?;
        Ok(latest.minus_months(self.settings.recent_window_months))
    }

    /// Profile of one town.
    ///
    /// A live all-town snapshot takes precedence over the per-town entry, so
    /// this agrees with [`Self::aggregate_all`] while that snapshot lasts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientData`] if the town has no transactions,
    /// or a store error.
    #[instrument(skip(self), fields(operation = "aggregate", town = %town))]
    pub fn aggregate(&self, town: Town) -> Result<Arc<TownProfile>> {
        let window = self.settings.recent_window_months;
        if let Some(CachedProfiles::All(profiles)) = self.cache.peek(&ProfileKey::All(window)) {
            return profiles.get(&town).cloned().map(Arc::new).ok_or_else(|| {
                Error::InsufficientData(format!("no transactions recorded for {town}"))
            });
        }
        let key = ProfileKey::Town(town, window);
        if let Some(CachedProfiles::Town(profile)) = self.cache.get(&key) {
            return Ok(profile);
        }

        let start = Instant::now();
        let records = self.store.by_town(town)?;
        if records.is_empty() {
            return Err(Error::InsufficientData(format!(
                "no transactions recorded for {town}"
            )));
        }
        let cutoff = self.recent_cutoff()?;
        let refs: Vec<&TransactionRecord> = records.iter().collect();
        let profile = Arc::new(build_profile(town, &refs, cutoff)?);

        metrics::histogram!("aggregation_duration_ms", "scope" => "town")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(
            transactions = profile.total_transactions,
            elapsed_ms = start.elapsed().as_millis(),
            "Aggregated town profile"
        );
        self.cache
            .put(key, CachedProfiles::Town(Arc::clone(&profile)));
        Ok(profile)
    }

    /// Profiles of every town that has transactions, from a single scan.
    ///
    /// # Errors
    ///
    /// Returns a store error. An empty store yields an empty map.
    #[instrument(skip(self), fields(operation = "aggregate_all"))]
    pub fn aggregate_all(&self) -> Result<Arc<ProfileMap>> {
        let key = ProfileKey::All(self.settings.recent_window_months);
        if let Some(CachedProfiles::All(profiles)) = self.cache.get(&key) {
            return Ok(profiles);
        }

        let start = Instant::now();
        let records = self.store.scan()?;
        let Some(latest) = records.iter().map(|r| r.transaction_date).max() else {
            return Ok(Arc::new(ProfileMap::new()));
        };
        let cutoff = latest.minus_months(self.settings.recent_window_months);

        let mut by_town: BTreeMap<Town, Vec<&TransactionRecord>> = BTreeMap::new();
        for record in &records {
            by_town.entry(record.town).or_default().push(record);
        }

        let mut profiles = ProfileMap::new();
        for (town, group) in by_town {
            profiles.insert(town, build_profile(town, &group, cutoff)?);
        }

        metrics::histogram!("aggregation_duration_ms", "scope" => "all")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(
            towns = profiles.len(),
            transactions = records.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Aggregated all towns"
        );
        let profiles = Arc::new(profiles);
        self.cache.put(key, CachedProfiles::All(Arc::clone(&profiles)));
        Ok(profiles)
    }
}
