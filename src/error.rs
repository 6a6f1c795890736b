//! Error types for estat-dl
//!
//! Errors fall into two groups:
//! - [`Error`] aborts a whole operation (bad input schema, missing credential,
//!   unreadable list file). It is returned to the caller.
//! - [`DownloadError`] ends a single entry's fetch. It never escapes the entry
//!   boundary: the engines turn it into a [`DownloadFailure`](crate::types::DownloadFailure)
//!   record inside the batch result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for estat-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for estat-dl
#[derive(Debug, Error)]
pub enum Error {
    /// The entry list is missing required columns
    #[error("Missing required columns: {}", missing.join(", "))]
    Schema {
        /// Names of the required columns that were not found in the header row
        missing: Vec<String>,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "ESTAT_API_KEY")
        key: Option<String>,
    },

    /// The entry list contained no valid entries
    #[error("no valid entries found in {0}")]
    NoValidEntries(String),

    /// Malformed entry list
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Entry list could not be decoded to text
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error (HTTP client construction)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// No candidate encoding could represent a text payload
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodingError {
    /// Every strict decoder rejected the bytes and the statistical guess was unusable
    #[error("could not detect file encoding")]
    Undetectable,

    /// The statistical guess decoded the bytes, but too little of the result looks like text
    #[error("could not detect file encoding: best guess {encoding} has confidence {confidence:.2}")]
    LowConfidence {
        /// Name of the guessed encoding
        encoding: &'static str,
        /// Fraction of decoded characters that look like text (0.0 to 1.0)
        confidence: f64,
    },
}

/// Terminal failure of a single entry's fetch
///
/// None of these are retried. The engines convert them into
/// [`DownloadFailure`](crate::types::DownloadFailure) records.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Connection-level failure, timeout, or a broken body stream
    #[error("Request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Server answered with a non-2xx status
    #[error("HTTP error: {reason}")]
    HttpStatus {
        /// Numeric HTTP status code
        status: u16,
        /// Reason phrase for the status
        reason: String,
    },

    /// The payload arrived but could not be converted to UTF-8
    #[error("Encoding conversion failed: {source}")]
    Encoding {
        /// HTTP status of the exchange that delivered the payload
        status: u16,
        /// Why decoding failed
        #[source]
        source: EncodingError,
    },

    /// Anything else (file I/O, invalid response body, panicked task)
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Machine-readable classification of a per-entry failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection-level failure (no status code)
    Transport,
    /// Non-2xx HTTP response
    HttpStatus,
    /// Payload could not be decoded
    Encoding,
    /// Internal fault
    Unexpected,
}

impl DownloadError {
    /// HTTP status obtained before the failure, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DownloadError::Transport(_) | DownloadError::Unexpected(_) => None,
            DownloadError::HttpStatus { status, .. } | DownloadError::Encoding { status, .. } => {
                Some(*status)
            }
        }
    }

    /// Classification of this failure
    pub fn kind(&self) -> FailureKind {
        match self {
            DownloadError::Transport(_) => FailureKind::Transport,
            DownloadError::HttpStatus { .. } => FailureKind::HttpStatus,
            DownloadError::Encoding { .. } => FailureKind::Encoding,
            DownloadError::Unexpected(_) => FailureKind::Unexpected,
        }
    }

    /// Build an [`HttpStatus`](DownloadError::HttpStatus) error from a response status
    pub(crate) fn from_status(status: reqwest::StatusCode) -> Self {
        DownloadError::HttpStatus {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        DownloadError::Unexpected(e.to_string())
    }
}
