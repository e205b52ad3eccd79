//! Resale CSV reader.
//!
//! Expected columns (header names, any order, extra columns ignored):
//! `month, town, flat_type, storey_range, floor_area_sqm, lease_commence_date,
//! resale_price`.

use crate::models::{FlatType, Town, TransactionRecord, YearMonth};
use crate::storage::TransactionStore;
use crate::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::instrument;

/// Records written per `insert_batch` call.
const BATCH_SIZE: usize = 1_000;

/// Rejected-row reasons kept in the report.
const MAX_REPORTED_ERRORS: usize = 20;

static STOREY_RANGE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+TO\s+(\d+)\s*$").ok());

/// Parses a published storey range such as `"10 TO 12"` to its midpoint
/// storey, rounded down. A bare number is accepted as-is.
#[must_use]
pub fn parse_storey_range(raw: &str) -> Option<u32> {
    if let Ok(storey) = raw.trim().parse::<u32>() {
        return Some(storey);
    }
    let upper = raw.to_uppercase();
    let captures = STOREY_RANGE.as_ref()?.captures(&upper)?;
    let low: u32 = captures.get(1)?.as_str().parse().ok()?;
    let high: u32 = captures.get(2)?.as_str().parse().ok()?;
    if low > high {
        return None;
    }
    Some(u32::midpoint(low, high))
}

/// Outcome of a CSV import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Data rows read.
    pub read: usize,
    /// Rows written to the store.
    pub imported: usize,
    /// Rows rejected by parsing or validation.
    pub skipped: usize,
    /// First few rejection reasons, `line N: reason`.
    pub errors: Vec<String>,
}

impl ImportReport {
    fn reject(&mut self, line: u64, reason: &Error) {
        self.skipped += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(format!("line {line}: {reason}"));
        }
    }
}

#[derive(Debug)]
struct ColumnMap {
    month: usize,
    town: usize,
    flat_type: usize,
    storey_range: usize,
    floor_area_sqm: usize,
    lease_commence_date: usize,
    resale_price: usize,
}

impl ColumnMap {
    fn from_headers(headers: &::csv::StringRecord) -> Result<Self> {
        let find = |names: &[&str]| -> Result<usize> {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
                .ok_or_else(|| {
                    Error::invalid_input("csv", format!("missing required column '{}'", names[0]))
                })
        };

        Ok(Self {
            month: find(&["month"])?,
            town: find(&["town"])?,
            flat_type: find(&["flat_type"])?,
            storey_range: find(&["storey_range", "storey"])?,
            floor_area_sqm: find(&["floor_area_sqm"])?,
            lease_commence_date: find(&["lease_commence_date", "lease_commence_year"])?,
            resale_price: find(&["resale_price"])?,
        })
    }
}

/// Streaming reader over a resale CSV export.
pub struct ResaleCsvSource<R: BufRead> {
    reader: ::csv::Reader<R>,
    columns: ColumnMap,
}

impl<R: BufRead> ResaleCsvSource<R> {
    /// Wraps a reader, consuming the header row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a required column is missing, or
    /// [`Error::OperationFailed`] if the header cannot be read.
    pub fn new(reader: R) -> Result<Self> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(::csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| Error::operation("read_csv_headers", e))?
            .clone();
        let columns = ColumnMap::from_headers(&headers)?;

        Ok(Self { reader, columns })
    }

    /// Reads the next row.
    ///
    /// The outer `Result` fails on I/O errors; the inner one carries row-level
    /// rejections so callers can skip and continue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the underlying reader fails.
    pub fn next_record(&mut self) -> Result<Option<(u64, Result<TransactionRecord>)>> {
        let mut row = ::csv::StringRecord::new();
        let has_row = self
            .reader
            .read_record(&mut row)
            .map_err(|e| Error::operation("read_csv", e))?;
        if !has_row {
            return Ok(None);
        }
        let line = row.position().map_or(0, ::csv::Position::line);
        Ok(Some((line, self.parse_row(&row))))
    }

    fn parse_row(&self, row: &::csv::StringRecord) -> Result<TransactionRecord> {
        let town_raw = field(row, self.columns.town, "town")?;
        let town = Town::parse(town_raw).ok_or_else(|| Error::UnknownCategory {
            field: "town".to_string(),
            value: town_raw.to_string(),
        })?;
        let flat_type_raw = field(row, self.columns.flat_type, "flat_type")?;
        let flat_type = FlatType::parse(flat_type_raw).ok_or_else(|| Error::UnknownCategory {
            field: "flat_type".to_string(),
            value: flat_type_raw.to_string(),
        })?;
        let storey_raw = field(row, self.columns.storey_range, "storey_range")?;
        let storey = parse_storey_range(storey_raw).ok_or_else(|| {
            Error::invalid_input("storey_range", format!("unrecognised range '{storey_raw}'"))
        })?;
        let lease_raw = field(row, self.columns.lease_commence_date, "lease_commence_date")?;
        let lease_commence_year = lease_raw.parse::<i32>().map_err(|e| {
            Error::invalid_input("lease_commence_date", format!("'{lease_raw}': {e}"))
        })?;

        let record = TransactionRecord {
            town,
            flat_type,
            floor_area_sqm: number(row, self.columns.floor_area_sqm, "floor_area_sqm")?,
            storey,
            lease_commence_year,
            resale_price: number(row, self.columns.resale_price, "resale_price")?,
            transaction_date: YearMonth::parse(field(row, self.columns.month, "month")?)?,
        };
        record.validate()?;
        Ok(record)
    }
}

fn field<'a>(row: &'a ::csv::StringRecord, idx: usize, name: &str) -> Result<&'a str> {
    row.get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::invalid_input(name, "missing value"))
}

fn number(row: &::csv::StringRecord, idx: usize, name: &str) -> Result<f64> {
    let raw = field(row, idx, name)?;
    raw.parse::<f64>()
        .map_err(|e| Error::invalid_input(name, format!("'{raw}': {e}")))
}

/// Imports every valid row from `reader` into `store`.
///
/// Invalid rows are skipped and counted; only reader or store failures abort.
///
/// # Errors
///
/// Returns an error if the header is unusable, the reader fails, or the
/// store rejects a batch.
#[instrument(skip(reader, store), fields(store = store.name()))]
pub fn import_csv<R: BufRead>(reader: R, store: &dyn TransactionStore) -> Result<ImportReport> {
    let start = Instant::now();
    let mut source = ResaleCsvSource::new(reader)?;
    let mut report = ImportReport::default();
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    while let Some((line, parsed)) = source.next_record()? {
        report.read += 1;
        match parsed {
            Ok(record) => batch.push(record),
            Err(e) => {
                tracing::debug!(line, error = %e, "Skipping resale row");
                report.reject(line, &e);
            },
        }
        if batch.len() >= BATCH_SIZE {
            report.imported += store.insert_batch(&batch)?;
            batch.clear();
        }
    }
    if !batch.is_empty() {
        report.imported += store.insert_batch(&batch)?;
    }

    metrics::counter!("import_rows_total", "status" => "imported").increment(report.imported as u64);
    metrics::counter!("import_rows_total", "status" => "skipped").increment(report.skipped as u64);
    tracing::info!(
        read = report.read,
        imported = report.imported,
        skipped = report.skipped,
        elapsed_ms = start.elapsed().as_millis(),
        "Resale CSV import finished"
    );
    Ok(report)
}

/// Opens `path` and imports it with [`import_csv`].
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the file cannot be opened, plus any
/// error from [`import_csv`].
pub fn import_csv_file(path: &Path, store: &dyn TransactionStore) -> Result<ImportReport> {
    let file = File::open(path)
        .map_err(|e| Error::operation("open_csv", format!("{}: {e}", path.display())))?;
    import_csv(BufReader::new(file), store)
}
