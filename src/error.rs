//! Error types for the rate synchronization core.

use thiserror::Error;

/// A rate or currency code failed validation at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    #[error("Invalid currency code '{0}': expected 3 ASCII letters")]
    InvalidCode(String),

    #[error("Invalid rate {0}: must be finite and greater than zero")]
    InvalidRate(f64),

    #[error("Unparsable rate '{0}'")]
    UnparsableRate(String),

    #[error("Invalid pair identifier '{0}': expected 6 characters")]
    InvalidPairId(String),
}

/// The response document as a whole could not be decoded.
///
/// Individual malformed records never produce this; they are skipped.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed XML document: {0}")]
    Xml(String),
}

/// Failure of a single fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("I/O failure: {0}")]
    Io(String),

    #[error("HTTP error: {status}")]
    Status { status: u16 },

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Fetch cancelled")]
    Cancelled,

    #[error("Unexpected fetch failure: {0}")]
    Other(String),
}

impl FetchError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Io(_) => true,
            FetchError::Status { status } => *status >= 500 || *status == 408 || *status == 429,
            FetchError::InvalidUrl(_) | FetchError::Cancelled | FetchError::Other(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else if e.is_builder() {
            FetchError::InvalidUrl(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Status {
                status: status.as_u16(),
            }
        } else if e.is_connect() || e.is_request() || e.is_body() {
            FetchError::Io(e.to_string())
        } else {
            FetchError::Other(e.to_string())
        }
    }
}

/// Failure inside the durable or in-memory rate stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Rejected row: {0}")]
    Invalid(#[from] RateError),

    #[error("Storage backend failure: {0}")]
    Backend(#[from] fjall::Error),

    #[error("Row encoding failure: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Why a synchronization pass ended in failure.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Nothing to synchronize: fewer than two distinct currencies")]
    NothingToRequest,

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: FetchError },

    #[error("Fetch failed: {0}")]
    Fetch(FetchError),

    #[error("Response could not be parsed: {0}")]
    Parse(#[from] ParseError),

    #[error("Persisting rates failed: {0}")]
    Store(#[from] StoreError),

    #[error("Synchronization cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Timeout("slow".into()).is_transient());
        assert!(FetchError::Io("reset".into()).is_transient());
        assert!(FetchError::Status { status: 503 }.is_transient());
        assert!(FetchError::Status { status: 429 }.is_transient());
        assert!(!FetchError::Status { status: 404 }.is_transient());
        assert!(!FetchError::InvalidUrl("::".into()).is_transient());
        assert!(!FetchError::Cancelled.is_transient());
        assert!(!FetchError::Other("boom".into()).is_transient());
    }
}
