//! Transaction store trait.

use crate::Result;
use crate::models::{FlatType, Town, TransactionRecord, YearMonth};
use std::collections::BTreeSet;

/// Query interface over historical resale transactions.
///
/// Stores are append-only from the engine's point of view: every query path
/// is a pure read, and records are never mutated once written.
pub trait TransactionStore: Send + Sync {
    /// Short backend name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Returns every transaction in a town.
    fn by_town(&self, town: Town) -> Result<Vec<TransactionRecord>>;

    /// Returns transactions whose month lies in `from..=to`.
    fn by_date_range(&self, from: YearMonth, to: YearMonth) -> Result<Vec<TransactionRecord>>;

    /// Returns every transaction.
    fn scan(&self) -> Result<Vec<TransactionRecord>>;

    /// Appends records. Used by ingestion tooling, never by query paths.
    fn insert_batch(&self, records: &[TransactionRecord]) -> Result<usize>;

    /// Returns the number of stored transactions.
    fn count(&self) -> Result<usize> {
        Ok(self.scan()?.len())
    }

    /// Returns the month of the most recent transaction.
    fn latest_transaction_date(&self) -> Result<Option<YearMonth>> {
        Ok(self.scan()?.iter().map(|r| r.transaction_date).max())
    }

    /// Returns the towns that have at least one transaction.
    fn distinct_towns(&self) -> Result<BTreeSet<Town>> {
        Ok(self.scan()?.iter().map(|r| r.town).collect())
    }

    /// Returns the flat types that have at least one transaction.
    fn distinct_flat_types(&self) -> Result<BTreeSet<FlatType>> {
        Ok(self.scan()?.iter().map(|r| r.flat_type).collect())
    }
}

impl<T: TransactionStore + ?Sized> TransactionStore for std::sync::Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn by_town(&self, town: Town) -> Result<Vec<TransactionRecord>> {
        (**self).by_town(town)
    }

    fn by_date_range(&self, from: YearMonth, to: YearMonth) -> Result<Vec<TransactionRecord>> {
        (**self).by_date_range(from, to)
    }

    fn scan(&self) -> Result<Vec<TransactionRecord>> {
        (**self).scan()
    }

    fn insert_batch(&self, records: &[TransactionRecord]) -> Result<usize> {
        (**self).insert_batch(records)
    }

    fn count(&self) -> Result<usize> {
        (**self).count()
    }

    fn latest_transaction_date(&self) -> Result<Option<YearMonth>> {
        (**self).latest_transaction_date()
    }

    fn distinct_towns(&self) -> Result<BTreeSet<Town>> {
        (**self).distinct_towns()
    }

    fn distinct_flat_types(&self) -> Result<BTreeSet<FlatType>> {
        (**self).distinct_flat_types()
    }
}
