//! In-memory transaction store.

use super::traits::TransactionStore;
use crate::models::{Town, TransactionRecord, YearMonth};
use crate::Result;
use std::sync::RwLock;

/// Transaction store held entirely in memory.
///
/// Suitable for tests and for datasets loaded once from CSV at startup.
/// Reads take a shared lock; `insert_batch` takes the exclusive lock.
#[derive(Debug, Default)]
pub struct MemoryTransactionStore {
    records: RwLock<Vec<TransactionRecord>>,
}

impl MemoryTransactionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from existing records after validating each one.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn with_records(records: Vec<TransactionRecord>) -> Result<Self> {
        for record in &records {
            record.validate()?;
        }
        Ok(Self {
            records: RwLock::new(records),
        })
    }

    fn read_filtered<F>(&self, mut keep: F) -> Vec<TransactionRecord>
    where
        F: FnMut(&TransactionRecord) -> bool,
    {
        self.records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|record| keep(record))
            .cloned()
            .collect()
    }
}

impl TransactionStore for MemoryTransactionStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn by_town(&self, town: Town) -> Result<Vec<TransactionRecord>> {
        Ok(self.read_filtered(|record| record.town == town))
    }

    fn by_date_range(&self, from: YearMonth, to: YearMonth) -> Result<Vec<TransactionRecord>> {
        Ok(self.read_filtered(|record| {
            record.transaction_date >= from && record.transaction_date <= to
        }))
    }

    fn scan(&self) -> Result<Vec<TransactionRecord>> {
        Ok(self.read_filtered(|_| true))
    }

    fn insert_batch(&self, records: &[TransactionRecord]) -> Result<usize> {
        for record in records {
            record.validate()?;
        }
        self.records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend_from_slice(records);
        Ok(records.len())
    }

    fn count(&self) -> Result<usize> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len())
    }

    fn latest_transaction_date(&self) -> Result<Option<YearMonth>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|record| record.transaction_date)
            .max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlatType;

    fn record(town: Town, year: i32, month: u32) -> TransactionRecord {
        TransactionRecord {
            town,
            flat_type: FlatType::FourRoom,
            floor_area_sqm: 92.0,
            storey: 8,
            lease_commence_year: 1995,
            resale_price: 480_000.0,
            transaction_date: YearMonth { year, month },
        }
    }

    #[test]
    fn test_filters() {
        let store = MemoryTransactionStore::with_records(vec![
            record(Town::Bedok, 2022, 1),
            record(Town::Bedok, 2023, 6),
            record(Town::Punggol, 2024, 2),
        ])
        .unwrap();

        assert_eq!(store.by_town(Town::Bedok).unwrap().len(), 2);
        assert!(store.by_town(Town::Bishan).unwrap().is_empty());

        let range = store
            .by_date_range(YearMonth { year: 2023, month: 1 }, YearMonth { year: 2024, month: 2 })
            .unwrap();
        assert_eq!(range.len(), 2);

        assert_eq!(
            store.latest_transaction_date().unwrap(),
            Some(YearMonth { year: 2024, month: 2 })
        );
        assert_eq!(store.distinct_towns().unwrap().len(), 2);
    }

    #[test]
    fn test_insert_batch_validates() {
        let store = MemoryTransactionStore::new();
        let mut bad = record(Town::Bedok, 2022, 1);
        bad.floor_area_sqm = 0.0;

        assert!(store.insert_batch(&[bad]).is_err());
        assert_eq!(store.count().unwrap(), 0);

        assert_eq!(store.insert_batch(&[record(Town::Bedok, 2022, 1)]).unwrap(), 1);
        assert_eq!(store.count().unwrap(), 1);
    }
}
