//! Retry policy and attempt classification
//!
//! Whether a request is retried is decided here from the attempt's outcome
//! alone, never from where the failure was observed.

use std::time::Duration;

use super::transport::{HttpResponse, TransportError};
use crate::error::Error;

/// Statuses that signal a transient provider condition
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 16_000;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Default shape (1 unit doubling to 16 units, 5 attempts) scaled to `unit`
    pub fn with_unit(unit: Duration) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: unit,
            max_backoff: unit * 16,
        }
    }

    /// Wait before retry number `retry` (0-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(31));
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }

    /// Attempts actually allowed (at least one)
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// A failure worth retrying
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransientFailure {
    Status { status: u16, body: String },
    Network(TransportError),
}

impl std::fmt::Display for TransientFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientFailure::Status { status, .. } => write!(f, "HTTP {}", status),
            TransientFailure::Network(err) => write!(f, "{}", err),
        }
    }
}

/// What a single attempt amounted to
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(HttpResponse),
    Retryable(TransientFailure),
    Terminal(Error),
}

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Classify the raw result of one exchange
pub fn classify(result: Result<HttpResponse, TransportError>) -> AttemptOutcome {
    match result {
        Ok(response) if response.is_success() => AttemptOutcome::Success(response),
        Ok(response) if is_retryable_status(response.status) => {
            AttemptOutcome::Retryable(TransientFailure::Status {
                status: response.status,
                body: response.text(),
            })
        }
        Ok(response) => AttemptOutcome::Terminal(Error::fatal(response.status, response.text())),
        Err(err) => AttemptOutcome::Retryable(TransientFailure::Network(err)),
    }
}
