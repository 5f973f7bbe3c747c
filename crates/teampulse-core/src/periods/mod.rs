//! Period bucketing
//!
//! Maps dates onto named periods: calendar quarters from explicit
//! definitions, or fiscal quarters with a trailing grace period.

pub mod fiscal;
pub mod quarter;
pub mod range;

use chrono::NaiveDate;

pub use fiscal::{FiscalBucketer, FiscalQuarter};
pub use quarter::{default_quarters, validate_quarters, CalendarBucketer, QuarterDef};
pub use range::{normalize_date, parse_date, parse_date_prefix, DateRange};

/// Date to period name
pub trait PeriodBucketer {
    fn bucket(&self, date: NaiveDate) -> String;
}

/// Chronological sort key for period labels.
///
/// Understands `"2024 Q3"`, `"FY25 Q1"` and `"2024-07"`. Anything else
/// returns `None` and sorts after every recognised period.
pub fn period_sort_key(label: &str) -> Option<(i32, u32)> {
    let label = label.trim();

    if let Some((year, quarter)) = label.split_once(" Q") {
        let quarter: u32 = quarter.parse().ok()?;
        let year = match year.strip_prefix("FY") {
            Some(yy) if yy.len() == 2 => 2000 + yy.parse::<i32>().ok()?,
            Some(yyyy) => yyyy.parse().ok()?,
            None => year.parse().ok()?,
        };
        return Some((year, quarter));
    }

    if let Some((year, month)) = label.split_once('-') {
        if year.len() == 4 && month.len() == 2 {
            return Some((year.parse().ok()?, month.parse().ok()?));
        }
    }

    None
}
