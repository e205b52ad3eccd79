//! Reference-date sources.
//!
//! Flat age and launch gaps are computed against an explicit "as of" month.
//! The engine samples the clock once per request and passes the value down.

use crate::models::YearMonth;
use chrono::{Datelike, Utc};

/// Source of the reference month.
pub trait Clock: Send + Sync {
    /// Returns the current reference month.
    fn today(&self) -> YearMonth;
}

/// Wall-clock time in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> YearMonth {
        let now = Utc::now();
        YearMonth {
            year: now.year(),
            month: now.month(),
        }
    }
}

/// A clock pinned to one month.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub YearMonth);

impl Clock for FixedClock {
    fn today(&self) -> YearMonth {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock(YearMonth { year: 2025, month: 6 });
        assert_eq!(clock.today(), YearMonth { year: 2025, month: 6 });
    }

    #[test]
    fn test_system_clock_is_sane() {
        let today = SystemClock.today();
        assert!(today.year >= 2024);
        assert!((1..=12).contains(&today.month));
    }
}
