//! Date windows and date normalisation

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Query window: `after` inclusive, `before` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub after: NaiveDate,
    pub before: NaiveDate,
}

impl DateRange {
    pub fn new(after: NaiveDate, before: NaiveDate) -> Result<Self> {
        if after >= before {
            return Err(Error::validation(format!(
                "Date range start {} must be before end {}",
                after, before
            )));
        }
        Ok(Self { after, before })
    }

    /// The `days` days leading up to `today` (exclusive)
    pub fn last_days(today: NaiveDate, days: i64) -> Result<Self> {
        Self::new(today - Duration::days(days), today)
    }

    /// From the first of the month `months` months back, up to `today`
    pub fn last_months(today: NaiveDate, months: u32) -> Result<Self> {
        let first = today
            .with_day(1)
            .and_then(|d| d.checked_sub_months(Months::new(months)))
            .ok_or_else(|| Error::validation(format!("Cannot go back {} months from {}", months, today)))?;
        Self::new(first, today)
    }

    /// Resolve optional `YYYY-MM-DD` bounds against a default window
    pub fn resolve(after: Option<&str>, before: Option<&str>, today: NaiveDate, default_days: i64) -> Result<Self> {
        let before = match before {
            Some(s) => parse_date(s)?,
            None => today,
        };
        let after = match after {
            Some(s) => parse_date(s)?,
            None => before - Duration::days(default_days),
        };
        Self::new(after, before)
    }

    /// Number of days covered
    pub fn days(&self) -> i64 {
        (self.before - self.after).num_days()
    }

    /// Last day actually covered
    pub fn inclusive_end(&self) -> NaiveDate {
        self.before - Duration::days(1)
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.after, self.inclusive_end())
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| Error::validation(format!("Invalid date '{}'. Use YYYY-MM-DD", s)))
}

/// Leading `YYYY-MM-DD` of a date or timestamp string
pub fn parse_date_prefix(s: &str) -> Option<NaiveDate> {
    let prefix = s.get(..10)?;
    NaiveDate::parse_from_str(prefix, DATE_FORMAT).ok()
}

/// Provider timestamp reduced to `YYYY-MM-DD`; unparseable input is kept
pub fn normalize_date(s: Option<&str>) -> String {
    match s {
        None => String::new(),
        Some(raw) if raw.trim().is_empty() => String::new(),
        Some(raw) => parse_date_prefix(raw.trim())
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| raw.to_string()),
    }
}
