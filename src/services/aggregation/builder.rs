//! Town profile construction.

use super::stats::{median, min_max};
use crate::models::{
    DataPeriod, FlatType, FlatTypeTrend, LeaseVintage, PriceRange, PriceTrend,
    RepresentativeUnit, Town, TownProfile, TransactionRecord, YearMonth,
};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Builds a profile from one town's transactions.
///
/// A record is recent when its month is strictly after `recent_cutoff`.
///
/// # Errors
///
/// Returns [`Error::InsufficientData`] if `records` is empty.
#[allow(clippy::cast_precision_loss)]
pub fn build_profile(
    town: Town,
    records: &[&TransactionRecord],
    recent_cutoff: YearMonth,
) -> Result<TownProfile> {
    let (Some(first), Some(last)) = (
        records.iter().map(|r| r.transaction_date).min(),
        records.iter().map(|r| r.transaction_date).max(),
    ) else {
        return Err(Error::InsufficientData(format!(
            "no transactions recorded for {town}"
        )));
    };

    let total = records.len();
    let mut by_flat_type: BTreeMap<FlatType, Vec<&TransactionRecord>> = BTreeMap::new();
    for &record in records {
        by_flat_type.entry(record.flat_type).or_default().push(record);
    }

    let flat_type_counts: BTreeMap<FlatType, usize> = by_flat_type
        .iter()
        .map(|(flat_type, group)| (*flat_type, group.len()))
        .collect();
    let flat_type_mix = flat_type_counts
        .iter()
        .map(|(flat_type, count)| (*flat_type, *count as f64 / total as f64))
        .collect();

    let mut size_distribution = BTreeMap::new();
    let mut price_ranges = BTreeMap::new();
    let mut representative_units = BTreeMap::new();
    let mut recent_by_flat_type = BTreeMap::new();
    for (flat_type, group) in &by_flat_type {
        let areas: Vec<f64> = group.iter().map(|r| r.floor_area_sqm).collect();
        let prices: Vec<f64> = group.iter().map(|r| r.resale_price).collect();
        let storeys: Vec<f64> = group.iter().map(|r| f64::from(r.storey)).collect();
        let leases: Vec<f64> = group
            .iter()
            .map(|r| f64::from(r.lease_commence_year))
            .collect();

        let (Some(area), Some(price_median), Some((min, max)), Some(storey), Some(lease)) = (
            median(areas),
            median(prices.clone()),
            min_max(&prices),
            median(storeys),
            median(leases),
        ) else {
            continue;
        };

        size_distribution.insert(*flat_type, area);
        price_ranges.insert(
            *flat_type,
            PriceRange {
                min,
                median: price_median,
                max,
            },
        );
        representative_units.insert(
            *flat_type,
            RepresentativeUnit {
                floor_area_sqm: area,
                storey: whole_storey(storey),
                lease_commence_year: whole_year(lease),
            },
        );

        let recent: Vec<f64> = group
            .iter()
            .filter(|r| r.transaction_date > recent_cutoff)
            .map(|r| r.resale_price)
            .collect();
        let recent_count = recent.len();
        if let Some(recent_median) = median(recent) {
            recent_by_flat_type.insert(
                *flat_type,
                FlatTypeTrend {
                    recent_median,
                    recent_transactions: recent_count,
                },
            );
        }
    }

    let recent_prices: Vec<f64> = records
        .iter()
        .filter(|r| r.transaction_date > recent_cutoff)
        .map(|r| r.resale_price)
        .collect();
    let recent_transactions = recent_prices.len();
    let overall_median = median(records.iter().map(|r| r.resale_price).collect())
        .unwrap_or_default();

    let lease_vintage = LeaseVintage {
        oldest: records.iter().map(|r| r.lease_commence_year).min().unwrap_or_default(),
        newest: records.iter().map(|r| r.lease_commence_year).max().unwrap_or_default(),
    };
    let data_period = DataPeriod {
        start: first,
        end: last,
    };

    Ok(TownProfile {
        town,
        total_transactions: total,
        flat_type_counts,
        flat_type_mix,
        price_trend: PriceTrend {
            overall_median,
            recent_median: median(recent_prices),
            recent_transactions,
            recent_by_flat_type,
        },
        size_distribution,
        price_ranges,
        representative_units,
        lease_vintage,
        data_period_label: data_period.to_string(),
        data_period,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_storey(value: f64) -> u32 {
    (value.floor() as u32).max(1)
}

#[allow(clippy::cast_possible_truncation)]
fn whole_year(value: f64) -> i32 {
    value.floor() as i32
}
