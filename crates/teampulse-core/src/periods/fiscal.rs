//! Fiscal quarters with a grace period
//!
//! Fiscal years are named after the calendar year they end in. A date that
//! lands within `grace_days` after the previous quarter's last day is
//! attributed to that previous quarter.

use chrono::{Datelike, Months, NaiveDate};

use super::PeriodBucketer;
use crate::config::FiscalSettings;

/// A fiscal quarter, `quarter` in 1..=4
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FiscalQuarter {
    pub fiscal_year: i32,
    pub quarter: u32,
}

impl FiscalQuarter {
    pub fn previous(self) -> Self {
        if self.quarter > 1 {
            Self {
                fiscal_year: self.fiscal_year,
                quarter: self.quarter - 1,
            }
        } else {
            Self {
                fiscal_year: self.fiscal_year - 1,
                quarter: 4,
            }
        }
    }

    pub fn label(&self) -> String {
        format!("FY{:02} Q{}", self.fiscal_year.rem_euclid(100), self.quarter)
    }
}

impl std::fmt::Display for FiscalQuarter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FiscalBucketer {
    start_month: u32,
    grace_days: i64,
}

impl Default for FiscalBucketer {
    fn default() -> Self {
        Self::new(&FiscalSettings::default())
    }
}

impl FiscalBucketer {
    pub fn new(settings: &FiscalSettings) -> Self {
        Self {
            start_month: settings.start_month.clamp(1, 12),
            grace_days: i64::from(settings.grace_days),
        }
    }

    /// Natural fiscal quarter of `date`, ignoring the grace period
    pub fn quarter_of(&self, date: NaiveDate) -> FiscalQuarter {
        let months_in = (date.month() + 12 - self.start_month) % 12;
        let fiscal_year = if self.start_month > 1 && date.month() >= self.start_month {
            date.year() + 1
        } else {
            date.year()
        };
        FiscalQuarter {
            fiscal_year,
            quarter: months_in / 3 + 1,
        }
    }

    /// First day of `quarter`
    pub fn quarter_start(&self, quarter: FiscalQuarter) -> Option<NaiveDate> {
        let start_year = if self.start_month > 1 {
            quarter.fiscal_year - 1
        } else {
            quarter.fiscal_year
        };
        NaiveDate::from_ymd_opt(start_year, self.start_month, 1)?
            .checked_add_months(Months::new((quarter.quarter - 1) * 3))
    }

    /// Last day of `quarter`
    pub fn quarter_end(&self, quarter: FiscalQuarter) -> Option<NaiveDate> {
        self.quarter_start(quarter)?
            .checked_add_months(Months::new(3))?
            .pred_opt()
    }

    /// Quarter for `date` with the grace period applied
    pub fn assign(&self, date: NaiveDate) -> FiscalQuarter {
        let natural = self.quarter_of(date);
        let previous = natural.previous();

        match self.quarter_end(previous) {
            Some(prev_end) => {
                let days_after = (date - prev_end).num_days();
                if days_after > 0 && days_after <= self.grace_days {
                    previous
                } else {
                    natural
                }
            }
            None => natural,
        }
    }
}

impl PeriodBucketer for FiscalBucketer {
    fn bucket(&self, date: NaiveDate) -> String {
        self.assign(date).label()
    }
}
