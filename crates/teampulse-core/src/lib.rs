//! # teampulse-core
//!
//! Engineering-metrics fetch pipeline shared by the `teampulse` CLI.
//!
//! This crate provides:
//! - A retrying request client over a swappable transport (`http` module)
//! - Offset pagination for item lists and JQL searches (`pager` module)
//! - Team hierarchy resolution with persisted exclusions (`hierarchy` module)
//! - Batched CSV export merging (`export` module)
//! - Calendar and fiscal quarter bucketing (`periods` module)
//! - Grouping and reduction over records (`aggregate` module)
//! - LinearB and Jira clients (`providers` module)
//! - Cycle time, lead time, incident, tech debt and tech module
//!   pipelines (`metrics` module)
//! - Unified error handling (`error` module)

pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod hierarchy;
pub mod http;
pub mod metrics;
pub mod pager;
pub mod periods;
pub mod providers;

// Re-exports for convenience
pub use config::Config;
pub use error::{Error, Result};

pub use aggregate::{aggregate, count_by, summarize, GroupKey, Reducer, Stats, Summary};
pub use export::{BatchedExporter, ExportQuery, ExportSource, GroupBy, MergedTable, MetricRecord, MetricSpec, RollUp};
pub use hierarchy::{ExclusionSet, Team};
pub use http::{ApiAuth, JiraAuthType, RequestClient, RetryPolicy, Transport};
pub use pager::Pager;
pub use periods::{CalendarBucketer, DateRange, FiscalBucketer, PeriodBucketer, QuarterDef};
pub use providers::{Issue, JiraClient, LinearbClient, Repository};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}
