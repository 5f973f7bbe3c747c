//! Calendar quarters
//!
//! Explicit `QuarterDef` lists with a computed `"{year} Q{n}"` fallback.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::PeriodBucketer;
use crate::error::{Error, Result};

/// A named half-open date range: `start` inclusive, `end` exclusive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarterDef {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl QuarterDef {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// The calendar quarter containing `date`
    pub fn calendar(date: NaiveDate) -> Option<Self> {
        Self::for_year_quarter(date.year(), calendar_quarter_of(date))
    }

    /// Calendar quarter `quarter` (1-4) of `year`
    pub fn for_year_quarter(year: i32, quarter: u32) -> Option<Self> {
        if !(1..=4).contains(&quarter) {
            return None;
        }
        let start_month = (quarter - 1) * 3 + 1;
        let start = NaiveDate::from_ymd_opt(year, start_month, 1)?;
        let end = if quarter == 4 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, start_month + 3, 1)?
        };
        Some(Self {
            name: calendar_label(year, quarter),
            start,
            end,
        })
    }
}

pub fn calendar_quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

pub fn calendar_label(year: i32, quarter: u32) -> String {
    format!("{} Q{}", year, quarter)
}

/// Quarters for the previous and current calendar year
pub fn default_quarters(today: NaiveDate) -> Vec<QuarterDef> {
    [today.year() - 1, today.year()]
        .into_iter()
        .flat_map(|year| (1..=4).filter_map(move |q| QuarterDef::for_year_quarter(year, q)))
        .collect()
}

/// Ranges must be non-empty, ascending and contiguous
pub fn validate_quarters(quarters: &[QuarterDef]) -> Result<()> {
    for q in quarters {
        if q.start >= q.end {
            return Err(Error::config(format!(
                "Quarter '{}' has start {} not before end {}",
                q.name, q.start, q.end
            )));
        }
    }

    for pair in quarters.windows(2) {
        if pair[0].end != pair[1].start {
            return Err(Error::config(format!(
                "Quarters '{}' and '{}' are not contiguous ({} vs {})",
                pair[0].name, pair[1].name, pair[0].end, pair[1].start
            )));
        }
    }

    Ok(())
}

/// Buckets dates by explicit definitions, falling back to calendar quarters
#[derive(Debug, Clone, Default)]
pub struct CalendarBucketer {
    quarters: Vec<QuarterDef>,
}

impl CalendarBucketer {
    pub fn new(quarters: Vec<QuarterDef>) -> Result<Self> {
        validate_quarters(&quarters)?;
        Ok(Self { quarters })
    }

    /// Configured quarters, or the generated defaults when none are given
    pub fn from_config(quarters: &[QuarterDef], today: NaiveDate) -> Result<Self> {
        if quarters.is_empty() {
            Self::new(default_quarters(today))
        } else {
            Self::new(quarters.to_vec())
        }
    }

    pub fn quarters(&self) -> &[QuarterDef] {
        &self.quarters
    }
}

impl PeriodBucketer for CalendarBucketer {
    fn bucket(&self, date: NaiveDate) -> String {
        self.quarters
            .iter()
            .find(|q| q.contains(date))
            .map(|q| q.name.clone())
            .unwrap_or_else(|| calendar_label(date.year(), calendar_quarter_of(date)))
    }
}
