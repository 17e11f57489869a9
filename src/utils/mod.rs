//! Calendar helpers and the clock abstraction
//!
//! Score aggregates are keyed by calendar date (daily) and by the first day of
//! the month (monthly). Every component that needs "today" asks a [`Clock`]
//! instead of reading the system time directly, so tests can pin the date.

use chrono::{Datelike, FixedOffset, Months, NaiveDate, Offset, Utc};
use std::sync::RwLock;

use crate::error::{Error, Result};

/// First day of the month containing `date`
pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the month before the one containing `date`
pub fn first_day_of_previous_month(date: NaiveDate) -> NaiveDate {
    let first = first_day_of_month(date);
    first.checked_sub_months(Months::new(1)).unwrap_or(first)
}

/// Source of the current calendar date
pub trait Clock: Send + Sync {
    /// Today's date in the leaderboard's timezone
    fn today(&self) -> NaiveDate;

    /// First day of the current month
    fn current_month(&self) -> NaiveDate {
        first_day_of_month(self.today())
    }

    /// First day of the previous month
    fn previous_month(&self) -> NaiveDate {
        first_day_of_previous_month(self.today())
    }
}

/// Wall clock with a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Create a clock for the given whole-hour UTC offset
    pub fn from_offset_hours(hours: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(hours * 3600)
            .ok_or_else(|| Error::config(format!("invalid UTC offset: {hours} hours")))?;
        Ok(Self { offset })
    }

    /// UTC clock
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Clock pinned to a settable date
#[derive(Debug)]
pub struct FixedClock {
    date: RwLock<NaiveDate>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: RwLock::new(date),
        }
    }

    /// Move the clock to another date
    pub fn set(&self, date: NaiveDate) {
        match self.date.write() {
            Ok(mut guard) => *guard = date,
            Err(poisoned) => *poisoned.into_inner() = date,
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        match self.date.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_day_of_month() {
        assert_eq!(first_day_of_month(date(2024, 5, 17)), date(2024, 5, 1));
        assert_eq!(first_day_of_month(date(2024, 5, 1)), date(2024, 5, 1));
    }

    #[test]
    fn test_first_day_of_previous_month_crosses_year() {
        assert_eq!(first_day_of_previous_month(date(2024, 1, 9)), date(2023, 12, 1));
        assert_eq!(first_day_of_previous_month(date(2024, 3, 31)), date(2024, 2, 1));
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::new(date(2024, 5, 1));
        assert_eq!(clock.today(), date(2024, 5, 1));
        assert_eq!(clock.previous_month(), date(2024, 4, 1));

        clock.set(date(2024, 6, 30));
        assert_eq!(clock.current_month(), date(2024, 6, 1));
    }

    #[test]
    fn test_system_clock_offset_validation() {
        assert!(SystemClock::from_offset_hours(7).is_ok());
        assert!(SystemClock::from_offset_hours(30).is_err());
    }
}
