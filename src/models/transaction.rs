//! Transaction records and calendar months.

use super::{FlatType, Town};
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A calendar month, the resolution of the transaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    /// Calendar year.
    pub year: i32,
    /// Month of year, 1-12.
    pub month: u32,
}

impl YearMonth {
    /// Creates a month, validating the month number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `month` is not in 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::invalid_input(
                "month",
                format!("{month} is not a calendar month"),
            ));
        }
        Ok(Self { year, month })
    }

    /// Parses `YYYY-MM`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for any other shape.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| Error::invalid_input("month", format!("expected YYYY-MM, got '{s}'")))?;
        let year = year
            .parse::<i32>()
            .map_err(|e| Error::invalid_input("month", format!("bad year in '{s}': {e}")))?;
        let month = month
            .parse::<u32>()
            .map_err(|e| Error::invalid_input("month", format!("bad month in '{s}': {e}")))?;
        Self::new(year, month)
    }

    /// Months since year 0, used for window arithmetic.
    #[must_use]
    pub const fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    /// Returns the month `months` before this one.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn minus_months(&self, months: u32) -> Self {
        let ordinal = self.ordinal() - months as i64;
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: (ordinal.rem_euclid(12) + 1) as u32,
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// One historical resale transaction.
///
/// Records are created by ingestion and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Town of the flat.
    pub town: Town,
    /// Flat type.
    pub flat_type: FlatType,
    /// Floor area in square metres.
    pub floor_area_sqm: f64,
    /// Storey (midpoint of the published storey range).
    pub storey: u32,
    /// Year the 99-year lease commenced.
    pub lease_commence_year: i32,
    /// Transacted resale price.
    pub resale_price: f64,
    /// Month of the transaction.
    pub transaction_date: YearMonth,
}

impl TransactionRecord {
    /// Checks the record invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first violated field.
    pub fn validate(&self) -> Result<()> {
        if !(self.floor_area_sqm.is_finite() && self.floor_area_sqm > 0.0) {
            return Err(Error::invalid_input(
                "floor_area_sqm",
                format!("{} is not a positive area", self.floor_area_sqm),
            ));
        }
        if self.storey == 0 {
            return Err(Error::invalid_input("storey", "storey must be positive"));
        }
        if !(self.resale_price.is_finite() && self.resale_price > 0.0) {
            return Err(Error::invalid_input(
                "resale_price",
                format!("{} is not a positive price", self.resale_price),
            ));
        }
        if self.lease_commence_year > self.transaction_date.year {
            return Err(Error::invalid_input(
                "lease_commence_year",
                format!(
                    "lease commenced {} after the {} transaction",
                    self.lease_commence_year, self.transaction_date
                ),
            ));
        }
        Ok(())
    }
}
