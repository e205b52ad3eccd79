//! `SQLite`-backed transaction store.

use super::{acquire_lock, configure_connection, record_operation_metrics, status_of};
use crate::models::{FlatType, Town, TransactionRecord, YearMonth};
use crate::storage::traits::TransactionStore;
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

const SELECT_COLUMNS: &str = "SELECT town, flat_type, floor_area_sqm, storey, lease_commence_year,
        resale_price, month FROM resale_transactions";

/// Transaction store persisted in a `resale_transactions` table.
///
/// Months are stored both as `YYYY-MM` text and as a month ordinal so range
/// queries hit the `(month_ordinal)` index.
///
/// # Concurrency Model
///
/// `rusqlite::Connection` is not `Sync`, so access goes through a
/// `Mutex<Connection>`. WAL mode keeps readers of other processes unblocked
/// while an import is running.
pub struct SqliteTransactionStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteTransactionStore {
    /// Opens (or creates) a store at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::operation("create_db_dir", e))?;
        }
        let conn = Connection::open(&db_path).map_err(|e| Error::operation("open_sqlite", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::operation("open_sqlite_in_memory", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS resale_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                town TEXT NOT NULL,
                flat_type TEXT NOT NULL,
                floor_area_sqm REAL NOT NULL,
                storey INTEGER NOT NULL,
                lease_commence_year INTEGER NOT NULL,
                resale_price REAL NOT NULL,
                month TEXT NOT NULL,
                month_ordinal INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_resale_town ON resale_transactions(town);
            CREATE INDEX IF NOT EXISTS idx_resale_month ON resale_transactions(month_ordinal);",
        )
        .map_err(|e| Error::operation("create_resale_table", e))?;
        Ok(())
    }

    fn query_records(
        &self,
        operation: &'static str,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<TransactionRecord>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| Error::operation(operation, e))?;
            let rows = stmt
                .query_map(params, read_row)
                .map_err(|e| Error::operation(operation, e))?;

            let mut records = Vec::new();
            for row in rows {
                let raw = row.map_err(|e| Error::operation(operation, e))?;
                records.push(raw.into_record()?);
            }
            Ok(records)
        })();

        record_operation_metrics(BACKEND, operation, start, status_of(&result));
        result
    }
}

/// Column values before domain parsing.
struct RawRow {
    town: String,
    flat_type: String,
    floor_area_sqm: f64,
    storey: i64,
    lease_commence_year: i32,
    resale_price: f64,
    month: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        town: row.get(0)?,
        flat_type: row.get(1)?,
        floor_area_sqm: row.get(2)?,
        storey: row.get(3)?,
        lease_commence_year: row.get(4)?,
        resale_price: row.get(5)?,
        month: row.get(6)?,
    })
}

impl RawRow {
    fn into_record(self) -> Result<TransactionRecord> {
        let town = Town::parse(&self.town).ok_or_else(|| Error::UnknownCategory {
            field: "town".to_string(),
            value: self.town.clone(),
        })?;
        let flat_type = FlatType::parse(&self.flat_type).ok_or_else(|| Error::UnknownCategory {
            field: "flat_type".to_string(),
            value: self.flat_type.clone(),
        })?;
        let storey = u32::try_from(self.storey)
            .map_err(|e| Error::invalid_input("storey", format!("{}: {e}", self.storey)))?;

        Ok(TransactionRecord {
            town,
            flat_type,
            floor_area_sqm: self.floor_area_sqm,
            storey,
            lease_commence_year: self.lease_commence_year,
            resale_price: self.resale_price,
            transaction_date: YearMonth::parse(&self.month)?,
        })
    }
}

impl TransactionStore for SqliteTransactionStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self), fields(operation = "by_town", backend = BACKEND, town = %town))]
    fn by_town(&self, town: Town) -> Result<Vec<TransactionRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE town = ?1 ORDER BY month_ordinal, id");
        self.query_records("by_town", &sql, params![town.as_str()])
    }

    #[instrument(skip(self), fields(operation = "by_date_range", backend = BACKEND, from = %from, to = %to))]
    fn by_date_range(&self, from: YearMonth, to: YearMonth) -> Result<Vec<TransactionRecord>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE month_ordinal BETWEEN ?1 AND ?2 ORDER BY month_ordinal, id"
        );
        self.query_records("by_date_range", &sql, params![from.ordinal(), to.ordinal()])
    }

    #[instrument(skip(self), fields(operation = "scan", backend = BACKEND))]
    fn scan(&self) -> Result<Vec<TransactionRecord>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY month_ordinal, id");
        self.query_records("scan", &sql, params![])
    }

    #[instrument(skip(self, records), fields(operation = "insert_batch", backend = BACKEND, count = records.len()))]
    fn insert_batch(&self, records: &[TransactionRecord]) -> Result<usize> {
        let start = Instant::now();
        let result = (|| {
            for record in records {
                record.validate()?;
            }

            let mut conn = acquire_lock(&self.conn);
            let tx = conn
                .transaction()
                .map_err(|e| Error::operation("begin_transaction", e))?;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO resale_transactions (town, flat_type, floor_area_sqm, storey,
                            lease_commence_year, resale_price, month, month_ordinal)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )
                    .map_err(|e| Error::operation("prepare_insert", e))?;
                for record in records {
                    stmt.execute(params![
                        record.town.as_str(),
                        record.flat_type.as_str(),
                        record.floor_area_sqm,
                        i64::from(record.storey),
                        record.lease_commence_year,
                        record.resale_price,
                        record.transaction_date.to_string(),
                        record.transaction_date.ordinal(),
                    ])
                    .map_err(|e| Error::operation("insert_transaction", e))?;
                }
            }
            // Dropping an uncommitted transaction rolls it back.
            tx.commit()
                .map_err(|e| Error::operation("commit_transaction", e))?;
            Ok(records.len())
        })();

        record_operation_metrics(BACKEND, "insert_batch", start, status_of(&result));
        result
    }

    fn count(&self) -> Result<usize> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM resale_transactions", [], |row| {
                    row.get(0)
                })
                .map_err(|e| Error::operation("count", e))?;
            usize::try_from(count).map_err(|e| Error::operation("count", e))
        })();

        record_operation_metrics(BACKEND, "count", start, status_of(&result));
        result
    }

    fn latest_transaction_date(&self) -> Result<Option<YearMonth>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let latest: Option<String> = conn
                .query_row(
                    "SELECT month FROM resale_transactions ORDER BY month_ordinal DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| Error::operation("latest_transaction_date", e))?;
            latest.as_deref().map(YearMonth::parse).transpose()
        })();

        record_operation_metrics(BACKEND, "latest_transaction_date", start, status_of(&result));
        result
    }

    fn distinct_towns(&self) -> Result<BTreeSet<Town>> {
        let names = self.distinct_column("distinct_towns", "town")?;
        Ok(names.iter().filter_map(|name| Town::parse(name)).collect())
    }

    fn distinct_flat_types(&self) -> Result<BTreeSet<FlatType>> {
        let names = self.distinct_column("distinct_flat_types", "flat_type")?;
        Ok(names.iter().filter_map(|name| FlatType::parse(name)).collect())
    }
}

impl SqliteTransactionStore {
    fn distinct_column(&self, operation: &'static str, column: &str) -> Result<Vec<String>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare(&format!("SELECT DISTINCT {column} FROM resale_transactions"))
                .map_err(|e| Error::operation(operation, e))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| Error::operation(operation, e))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| Error::operation(operation, e))
        })();

        record_operation_metrics(BACKEND, operation, start, status_of(&result));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(town: Town, flat_type: FlatType, year: i32, month: u32) -> TransactionRecord {
        TransactionRecord {
            town,
            flat_type,
            floor_area_sqm: 67.0,
            storey: 5,
            lease_commence_year: 1984,
            resale_price: 350_000.0,
            transaction_date: YearMonth { year, month },
        }
    }

    #[test]
    fn test_insert_and_query_by_town() {
        let store = SqliteTransactionStore::in_memory().unwrap();
        store
            .insert_batch(&[
                record(Town::AngMoKio, FlatType::ThreeRoom, 2023, 1),
                record(Town::AngMoKio, FlatType::FourRoom, 2023, 2),
                record(Town::Tampines, FlatType::FiveRoom, 2023, 3),
            ])
            .unwrap();

        let amk = store.by_town(Town::AngMoKio).unwrap();
        assert_eq!(amk.len(), 2);
        assert_eq!(amk[0], record(Town::AngMoKio, FlatType::ThreeRoom, 2023, 1));
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let store = SqliteTransactionStore::in_memory().unwrap();
        store
            .insert_batch(&[
                record(Town::Bedok, FlatType::FourRoom, 2022, 12),
                record(Town::Bedok, FlatType::FourRoom, 2023, 1),
                record(Town::Bedok, FlatType::FourRoom, 2023, 6),
                record(Town::Bedok, FlatType::FourRoom, 2023, 7),
            ])
            .unwrap();

        let range = store
            .by_date_range(YearMonth { year: 2023, month: 1 }, YearMonth { year: 2023, month: 6 })
            .unwrap();
        assert_eq!(range.len(), 2);
    }

    #[test]
    fn test_latest_and_distinct() {
        let store = SqliteTransactionStore::in_memory().unwrap();
        assert_eq!(store.latest_transaction_date().unwrap(), None);

        store
            .insert_batch(&[
                record(Town::Sengkang, FlatType::FourRoom, 2024, 3),
                record(Town::Punggol, FlatType::FiveRoom, 2024, 8),
            ])
            .unwrap();

        assert_eq!(
            store.latest_transaction_date().unwrap(),
            Some(YearMonth { year: 2024, month: 8 })
        );
        let towns = store.distinct_towns().unwrap();
        assert!(towns.contains(&Town::Sengkang));
        assert!(towns.contains(&Town::Punggol));
        assert_eq!(store.distinct_flat_types().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_batch_is_rejected_whole() {
        let store = SqliteTransactionStore::in_memory().unwrap();
        let mut bad = record(Town::Bedok, FlatType::FourRoom, 2023, 1);
        bad.resale_price = -1.0;

        let result = store.insert_batch(&[record(Town::Bedok, FlatType::FourRoom, 2023, 1), bad]);
        assert!(result.is_err());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("resale.db");
        {
            let store = SqliteTransactionStore::new(&path).unwrap();
            store
                .insert_batch(&[record(Town::Yishun, FlatType::FourRoom, 2021, 5)])
                .unwrap();
        }

        let reopened = SqliteTransactionStore::new(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        assert_eq!(reopened.db_path(), Some(&path));
    }
}
