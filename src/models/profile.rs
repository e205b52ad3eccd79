//! Per-town market statistics.

use super::{FlatType, Town, YearMonth};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Median resale price over the full history and the recent window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTrend {
    /// Median over every transaction in the town.
    pub overall_median: f64,
    /// Median over the recent window; absent when the town had no recent sales.
    pub recent_median: Option<f64>,
    /// Number of transactions in the recent window.
    pub recent_transactions: usize,
    /// Recent-window median per flat type, for flat types with recent sales.
    #[serde(default)]
    pub recent_by_flat_type: BTreeMap<FlatType, FlatTypeTrend>,
}

/// Recent-window statistics for one flat type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatTypeTrend {
    /// Median recent resale price.
    pub recent_median: f64,
    /// Recent transactions of this flat type.
    pub recent_transactions: usize,
}

/// Range of lease commencement years in a town.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseVintage {
    /// Oldest lease commencement year.
    pub oldest: i32,
    /// Newest lease commencement year.
    pub newest: i32,
}

/// First and last month covered by a town's transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPeriod {
    /// Earliest transaction month.
    pub start: YearMonth,
    /// Latest transaction month.
    pub end: YearMonth,
}

impl fmt::Display for DataPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Resale price spread for one flat type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    /// Lowest transacted price.
    pub min: f64,
    /// Median transacted price.
    pub median: f64,
    /// Highest transacted price.
    pub max: f64,
}

/// A typical unit of one flat type, used to price prospective launches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepresentativeUnit {
    /// Median floor area.
    pub floor_area_sqm: f64,
    /// Median storey.
    pub storey: u32,
    /// Median lease commencement year.
    pub lease_commence_year: i32,
}

/// Descriptive statistics for one town.
///
/// Invariants: the values of `flat_type_counts` sum to `total_transactions`,
/// `lease_vintage.oldest <= lease_vintage.newest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TownProfile {
    /// The town.
    pub town: Town,
    /// Number of transactions.
    pub total_transactions: usize,
    /// Transactions per flat type.
    pub flat_type_counts: BTreeMap<FlatType, usize>,
    /// Share of transactions per flat type.
    pub flat_type_mix: BTreeMap<FlatType, f64>,
    /// Overall versus recent median price.
    pub price_trend: PriceTrend,
    /// Median floor area per flat type.
    pub size_distribution: BTreeMap<FlatType, f64>,
    /// Min/median/max resale price per flat type.
    pub price_ranges: BTreeMap<FlatType, PriceRange>,
    /// Typical unit per flat type.
    pub representative_units: BTreeMap<FlatType, RepresentativeUnit>,
    /// Lease commencement range.
    pub lease_vintage: LeaseVintage,
    /// Months covered.
    pub data_period: DataPeriod,
    /// `data_period` rendered as `YYYY-MM to YYYY-MM`.
    pub data_period_label: String,
}

impl TownProfile {
    /// Flat types ordered by transaction count, most frequent first.
    ///
    /// Equal counts keep flat-type order.
    #[must_use]
    pub fn predominant_flat_types(&self, k: usize) -> Vec<FlatType> {
        let mut counted: Vec<(FlatType, usize)> = self
            .flat_type_counts
            .iter()
            .map(|(flat_type, count)| (*flat_type, *count))
            .collect();
        counted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counted.into_iter().take(k).map(|(ft, _)| ft).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predominant_flat_types_orders_by_count() {
        let mut counts = BTreeMap::new();
        counts.insert(FlatType::ThreeRoom, 40);
        counts.insert(FlatType::FourRoom, 55);
        counts.insert(FlatType::FiveRoom, 40);
        counts.insert(FlatType::Executive, 5);

        let profile = TownProfile {
            town: Town::Yishun,
            total_transactions: 140,
            flat_type_counts: counts,
            flat_type_mix: BTreeMap::new(),
            price_trend: PriceTrend {
                overall_median: 400_000.0,
                recent_median: None,
                recent_transactions: 0,
                recent_by_flat_type: BTreeMap::new(),
            },
            size_distribution: BTreeMap::new(),
            price_ranges: BTreeMap::new(),
            representative_units: BTreeMap::new(),
            lease_vintage: LeaseVintage {
                oldest: 1985,
                newest: 2015,
            },
            data_period: DataPeriod {
                start: YearMonth { year: 2017, month: 1 },
                end: YearMonth { year: 2024, month: 6 },
            },
            data_period_label: "2017-01 to 2024-06".to_string(),
        };

        assert_eq!(
            profile.predominant_flat_types(3),
            vec![FlatType::FourRoom, FlatType::ThreeRoom, FlatType::FiveRoom]
        );
        assert_eq!(profile.predominant_flat_types(1), vec![FlatType::FourRoom]);
    }

    #[test]
    fn test_data_period_display() {
        let period = DataPeriod {
            start: YearMonth { year: 2017, month: 1 },
            end: YearMonth { year: 2024, month: 12 },
        };
        assert_eq!(period.to_string(), "2017-01 to 2024-12");
    }
}
