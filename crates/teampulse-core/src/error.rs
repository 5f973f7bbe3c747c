//! Unified error handling for teampulse-core

use thiserror::Error;

/// Response bodies attached to fatal errors are cut to this many characters.
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Core error type for teampulse-core
#[derive(Error, Debug)]
pub enum Error {
    /// Non-retryable HTTP status from a provider
    #[error("Request failed with HTTP {status}: {body}")]
    Fatal { status: u16, body: String },

    /// The retry budget ran out on transient failures
    #[error("Exhausted retries after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Well-formed query that produced nothing across every batch or page
    #[error("No data: {0}")]
    NoData(String),

    #[error("Schema mismatch in batch {batch}: expected header `{expected}`, found `{found}`")]
    SchemaMismatch {
        batch: usize,
        expected: String,
        found: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for teampulse-core
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a fatal HTTP error, truncating the body for diagnostics
    pub fn fatal(status: u16, body: impl AsRef<str>) -> Self {
        Error::Fatal {
            status,
            body: truncate_body(body.as_ref()),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a no data error
    pub fn no_data(msg: impl Into<String>) -> Self {
        Error::NoData(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// True when the error means "valid query, empty result"
    pub fn is_no_data(&self) -> bool {
        matches!(self, Error::NoData(_))
    }
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
