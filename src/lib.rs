//! # estat-dl
//!
//! Batch downloader for statistical tables published on e-Stat, the Japanese
//! government statistics portal.
//!
//! ## Design Philosophy
//!
//! estat-dl is designed to be:
//! - **Validated up front** - The entry list is checked row by row before any request
//! - **Failure-tolerant** - One failed entry never stops its siblings
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Pipeline
//!
//! 1. [`validation`] reads the entry list (`url`, `format`, `identifier` columns)
//!    and splits it into file entries, metadata entries and invalid rows.
//! 2. [`downloader::FileDownloader`] fetches CSV/XLS files concurrently and
//!    converts CSV payloads to UTF-8 through [`encoding::EncodingResolver`].
//! 3. [`metadata::MetadataDownloader`] fetches JSON metadata for `DB` rows.
//!
//! ## Quick Start
//!
//! ```no_run
//! use estat_dl::{Config, download_stats};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let report = download_stats(Path::new("valid_urls.csv"), &config).await?;
//!
//!     for failure in &report.files.failures {
//!         eprintln!("{failure}");
//!     }
//!     println!("{} files downloaded", report.files.successes.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Bounded concurrent batch runner shared by both engines
mod batch;
/// Configuration types
pub mod config;
/// File download engine
pub mod downloader;
/// Charset detection and decoding
pub mod encoding;
/// Error types
pub mod error;
/// Metadata fetch engine
pub mod metadata;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Entry list loading and validation
pub mod validation;

use serde::Serialize;
use std::path::Path;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, EncodingPolicy, MetadataConfig, ValidationConfig};
pub use downloader::FileDownloader;
pub use encoding::EncodingResolver;
pub use error::{DownloadError, EncodingError, Error, FailureKind, Result};
pub use metadata::MetadataDownloader;
pub use types::{
    BatchResult, DownloadFailure, DownloadOutcome, Entry, Event, FileEntry, FileFormat,
    MetadataEntry, StatsDataId, ValidationResult,
};
pub use validation::load_and_validate_csv;

/// Outcome of [`download_stats`] and [`download_entries`]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DownloadReport {
    /// Rows rejected during validation as (1-based row number, message)
    pub invalid_rows: Vec<(usize, String)>,
    /// File engine results
    pub files: BatchResult,
    /// Metadata engine results (empty when the list had no `DB` rows)
    pub metadata: BatchResult,
}

impl DownloadReport {
    /// True when every row was valid and every entry succeeded
    pub fn is_success(&self) -> bool {
        self.invalid_rows.is_empty() && self.files.is_success() && self.metadata.is_success()
    }
}

/// Validate an entry list without downloading anything
///
/// # Errors
///
/// Fails if the file cannot be read or decoded, or if required columns are
/// missing. Invalid rows are reported in the result, not as an error.
pub fn validate_url_list(path: &Path, config: &Config) -> Result<ValidationResult> {
    load_and_validate_csv(path, &config.validation)
}

/// Validate an entry list and download everything it names
///
/// File entries go to the file engine. The metadata engine is only built
/// when the list contains metadata entries, so a missing API key matters only
/// then; it is checked before any file is fetched.
///
/// # Errors
///
/// Returns [`Error::NoValidEntries`] if no row is valid, [`Error::Config`]
/// for a missing API key or invalid setting, plus anything
/// [`validate_url_list`] returns. Per-entry failures are recorded in the
/// report.
pub async fn download_stats(path: &Path, config: &Config) -> Result<DownloadReport> {
    let validation = validate_url_list(path, config)?;
    for (row, message) in &validation.invalid_rows {
        tracing::warn!(row, error = %message, "Skipping invalid row");
    }

    if validation.is_empty() {
        return Err(Error::NoValidEntries(path.display().to_string()));
    }

    let batch_label = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let entries = validation.valid_entries();
    let (files, metadata) = run_engines(&entries, &batch_label, config).await?;

    Ok(DownloadReport {
        invalid_rows: validation.invalid_rows,
        files,
        metadata,
    })
}

/// Download already-built entries into the `estat_data` batch directory
///
/// Entries are numbered from 1 in slice order. An entry whose output file is
/// already taken by an earlier one is reported in `invalid_rows` and skipped.
///
/// # Errors
///
/// Returns [`Error::NoValidEntries`] for an empty slice and [`Error::Config`]
/// for a missing API key (only when metadata entries are present) or an
/// invalid setting.
pub async fn download_entries(entries: &[Entry], config: &Config) -> Result<DownloadReport> {
    if entries.is_empty() {
        return Err(Error::NoValidEntries("provided entries".to_string()));
    }

    let mut claims = validation::DestinationClaims::default();
    let mut invalid_rows = Vec::new();
    let mut accepted = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        match claims.claim(entry, idx + 1) {
            Ok(()) => accepted.push(entry.clone()),
            Err(message) => {
                tracing::warn!(row = idx + 1, error = %message, "Skipping duplicate entry");
                invalid_rows.push((idx + 1, message));
            }
        }
    }

    let (files, metadata) = run_engines(&accepted, utils::DEFAULT_BATCH_NAME, config).await?;
    Ok(DownloadReport {
        invalid_rows,
        files,
        metadata,
    })
}

/// Run the file engine, then the metadata engine when any metadata entry exists
///
/// The metadata engine is built first so a missing key fails before any transfer.
async fn run_engines(
    entries: &[Entry],
    batch_label: &str,
    config: &Config,
) -> Result<(BatchResult, BatchResult)> {
    let has_metadata = entries
        .iter()
        .any(|entry| matches!(entry, Entry::Metadata(_)));
    let metadata_engine = if has_metadata {
        Some(MetadataDownloader::new(config)?)
    } else {
        None
    };
    let file_engine = FileDownloader::new(config)?;

    let files = file_engine.download_all(entries, batch_label).await;
    let metadata = match metadata_engine {
        Some(engine) => engine.download_all(entries, batch_label).await,
        None => BatchResult::default(),
    };
    Ok((files, metadata))
}
