//! Single-town market analysis.

use super::aggregation::MarketAggregator;
use crate::models::{Town, TownProfile};
use crate::{Error, Result};
use std::sync::Arc;

/// Answers "what does this town's market look like".
pub struct TownAnalysisService {
    aggregator: Arc<MarketAggregator>,
}

impl TownAnalysisService {
    /// Creates the service.
    #[must_use]
    pub const fn new(aggregator: Arc<MarketAggregator>) -> Self {
        Self { aggregator }
    }

    /// Profiles the town named `town_name` (case-insensitive, trimmed).
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownTown`] if the name is not one of the 26 towns
    /// - [`Error::InsufficientData`] if the town has no transactions
    pub fn analyze(&self, town_name: &str) -> Result<Arc<TownProfile>> {
        let town =
            Town::parse(town_name).ok_or_else(|| Error::UnknownTown(town_name.trim().to_string()))?;
        self.aggregator.aggregate(town)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlatType, TransactionRecord, YearMonth};
    use crate::services::aggregation::AggregationSettings;
    use crate::storage::MemoryTransactionStore;

    fn service() -> TownAnalysisService {
        let store = MemoryTransactionStore::with_records(vec![TransactionRecord {
            town: Town::Woodlands,
            flat_type: FlatType::FiveRoom,
            floor_area_sqm: 120.0,
            storey: 10,
            lease_commence_year: 2000,
            resale_price: 560_000.0,
            transaction_date: YearMonth { year: 2024, month: 9 },
        }])
        .unwrap();
        TownAnalysisService::new(Arc::new(MarketAggregator::new(
            Arc::new(store),
            AggregationSettings::default(),
        )))
    }

    #[test]
    fn test_analyze_normalizes_name() {
        let profile = service().analyze("  woodlands ").unwrap();
        assert_eq!(profile.town, Town::Woodlands);
        assert_eq!(profile.total_transactions, 1);
    }

    #[test]
    fn test_unknown_and_empty_towns() {
        let svc = service();
        assert!(matches!(svc.analyze("Gotham"), Err(Error::UnknownTown(name)) if name == "Gotham"));
        assert!(matches!(svc.analyze("BISHAN"), Err(Error::InsufficientData(_))));
    }
}
