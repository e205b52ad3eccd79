//! Last major BTO launch per town.

use super::aggregation::MarketAggregator;
use crate::models::Town;
use crate::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reference data on when each town last had a major launch.
pub trait LaunchHistory: Send + Sync {
    /// Year of the last major launch in `town`, if known.
    fn last_major_launch(&self, town: Town) -> Result<Option<i32>>;

    /// Towns with a known launch year.
    fn known_towns(&self) -> Result<Vec<Town>>;
}

/// Launch years supplied by configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticLaunchHistory {
    years: BTreeMap<Town, i32>,
}

impl StaticLaunchHistory {
    /// Creates a history from a town → year map.
    #[must_use]
    pub const fn new(years: BTreeMap<Town, i32>) -> Self {
        Self { years }
    }
}

impl LaunchHistory for StaticLaunchHistory {
    fn last_major_launch(&self, town: Town) -> Result<Option<i32>> {
        Ok(self.years.get(&town).copied())
    }

    fn known_towns(&self) -> Result<Vec<Town>> {
        Ok(self.years.keys().copied().collect())
    }
}

/// Uses the newest lease commencement year seen in a town as a proxy for its
/// last major launch.
///
/// Reads the memoized all-town profiles, so a ranking pass sees the same
/// snapshot for launch years and market activity.
pub struct LeaseDerivedLaunchHistory {
    aggregator: Arc<MarketAggregator>,
}

impl LeaseDerivedLaunchHistory {
    /// Creates a history backed by `aggregator`.
    #[must_use]
    pub const fn new(aggregator: Arc<MarketAggregator>) -> Self {
        Self { aggregator }
    }
}

impl LaunchHistory for LeaseDerivedLaunchHistory {
    fn last_major_launch(&self, town: Town) -> Result<Option<i32>> {
        Ok(self
            .aggregator
            .aggregate_all()?
            .get(&town)
            .map(|profile| profile.lease_vintage.newest))
    }

    fn known_towns(&self) -> Result<Vec<Town>> {
        Ok(self.aggregator.aggregate_all()?.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlatType, TransactionRecord, YearMonth};
    use crate::services::aggregation::AggregationSettings;
    use crate::storage::MemoryTransactionStore;

    #[test]
    fn test_static_history() {
        let history = StaticLaunchHistory::new(BTreeMap::from([
            (Town::Bishan, 2011),
            (Town::Sembawang, 2023),
        ]));
        assert_eq!(history.last_major_launch(Town::Bishan).unwrap(), Some(2011));
        assert_eq!(history.last_major_launch(Town::Bedok).unwrap(), None);
        assert_eq!(history.known_towns().unwrap().len(), 2);
    }

    #[test]
    fn test_lease_derived_history() {
        let record = |town, lease| TransactionRecord {
            town,
            flat_type: FlatType::FourRoom,
            floor_area_sqm: 90.0,
            storey: 4,
            lease_commence_year: lease,
            resale_price: 500_000.0,
            transaction_date: YearMonth { year: 2024, month: 1 },
        };
        let store = MemoryTransactionStore::with_records(vec![
            record(Town::Punggol, 2005),
            record(Town::Punggol, 2018),
            record(Town::Bedok, 1979),
        ])
        .unwrap();

        let aggregator = MarketAggregator::new(Arc::new(store), AggregationSettings::default());
        let history = LeaseDerivedLaunchHistory::new(Arc::new(aggregator));
        assert_eq!(history.last_major_launch(Town::Punggol).unwrap(), Some(2018));
        assert_eq!(history.last_major_launch(Town::Yishun).unwrap(), None);
        assert_eq!(history.known_towns().unwrap(), vec![Town::Bedok, Town::Punggol]);
    }
}
