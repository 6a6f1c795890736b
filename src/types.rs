//! Core types for estat-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{DownloadError, FailureKind};

/// Number of digits in an e-Stat statistical table ID
pub const STATS_DATA_ID_LEN: usize = 10;

/// Validated e-Stat statistical table ID (exactly 10 ASCII digits)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StatsDataId(String);

impl StatsDataId {
    /// Parse an identifier, trimming surrounding whitespace first
    ///
    /// # Examples
    ///
    /// ```
    /// use estat_dl::types::StatsDataId;
    ///
    /// assert_eq!(StatsDataId::parse(" 0003191203 ").unwrap().as_str(), "0003191203");
    /// assert!(StatsDataId::parse("000010340063").is_err());
    /// ```
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("identifier cannot be empty".to_string());
        }
        if trimmed.len() != STATS_DATA_ID_LEN || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err("identifier must be a 10-digit number".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StatsDataId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for StatsDataId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StatsDataId {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StatsDataId> for String {
    fn from(id: StatsDataId) -> Self {
        id.0
    }
}

/// Declared format of an entry list row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileFormat {
    /// Comma-separated values (converted to UTF-8 after download)
    Csv,
    /// Excel workbook (stored verbatim)
    Xls,
    /// Database entry: metadata only, fetched through the API
    Db,
}

impl FileFormat {
    /// Parse the `format` column. Matching is case-sensitive.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "CSV" => Some(FileFormat::Csv),
            "XLS" => Some(FileFormat::Xls),
            "DB" => Some(FileFormat::Db),
            _ => None,
        }
    }

    /// Token used in the entry list
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "CSV",
            FileFormat::Xls => "XLS",
            FileFormat::Db => "DB",
        }
    }

    /// Filename suffix for files of this format
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => ".csv",
            FileFormat::Xls => ".xlsx",
            FileFormat::Db => ".meta.json",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file to download directly from the provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Source URL
    pub url: url::Url,
    /// CSV or XLS
    pub format: FileFormat,
    /// Statistical table ID (names the output file)
    pub stats_data_id: StatsDataId,
    /// Table title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Survey date; when present, the file is placed in a subdirectory of this name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_date: Option<String>,
}

impl FileEntry {
    /// Output filename: `{stats_data_id}.csv` or `{stats_data_id}.xlsx`
    pub fn filename(&self) -> String {
        format!("{}{}", self.stats_data_id, self.format.extension())
    }
}

/// A metadata record to fetch from the API by ID
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Statistical table ID
    pub stats_data_id: StatsDataId,
    /// Table title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MetadataEntry {
    /// Output filename: `{stats_data_id}.meta.json`
    pub fn filename(&self) -> String {
        format!("{}{}", self.stats_data_id, FileFormat::Db.extension())
    }
}

/// One validated row of the entry list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    /// Direct file download
    File(FileEntry),
    /// Metadata lookup
    Metadata(MetadataEntry),
}

impl Entry {
    /// Statistical table ID of either variant
    pub fn stats_data_id(&self) -> &StatsDataId {
        match self {
            Entry::File(e) => &e.stats_data_id,
            Entry::Metadata(e) => &e.stats_data_id,
        }
    }

    /// Output filename of either variant
    pub fn filename(&self) -> String {
        match self {
            Entry::File(e) => e.filename(),
            Entry::Metadata(e) => e.filename(),
        }
    }
}

impl From<FileEntry> for Entry {
    fn from(entry: FileEntry) -> Self {
        Entry::File(entry)
    }
}

impl From<MetadataEntry> for Entry {
    fn from(entry: MetadataEntry) -> Self {
        Entry::Metadata(entry)
    }
}

/// Outcome of validating an entry list
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Valid CSV/XLS rows, in input order
    pub file_entries: Vec<FileEntry>,
    /// Valid DB rows, in input order
    pub metadata_entries: Vec<MetadataEntry>,
    /// Invalid rows as (1-based data row number, joined error messages)
    pub invalid_rows: Vec<(usize, String)>,
}

impl ValidationResult {
    /// All valid entries, file entries first
    pub fn valid_entries(&self) -> Vec<Entry> {
        self.file_entries
            .iter()
            .cloned()
            .map(Entry::File)
            .chain(self.metadata_entries.iter().cloned().map(Entry::Metadata))
            .collect()
    }

    /// Number of valid entries
    pub fn valid_count(&self) -> usize {
        self.file_entries.len() + self.metadata_entries.len()
    }

    /// True when no row was valid
    pub fn is_empty(&self) -> bool {
        self.valid_count() == 0
    }
}

/// Why a single entry failed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadFailure {
    /// The URL (file entries) or statistical table ID (metadata entries)
    pub target: String,
    /// HTTP status, when an HTTP exchange completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Human-readable reason
    pub message: String,
    /// Failure classification
    pub kind: FailureKind,
}

impl DownloadFailure {
    /// Record a terminal error for `target`
    pub fn new(target: impl Into<String>, error: &DownloadError) -> Self {
        Self {
            target: target.into(),
            status_code: error.status_code(),
            message: error.to_string(),
            kind: error.kind(),
        }
    }
}

impl std::fmt::Display for DownloadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (Status: {}): {}", self.target, code, self.message),
            None => write!(f, "{}: {}", self.target, self.message),
        }
    }
}

/// Terminal state of one entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// File written at this path
    Success {
        /// Output path
        path: PathBuf,
    },
    /// Entry failed
    Failure(DownloadFailure),
}

/// Aggregated outcome of a batch
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Paths written successfully (completion order)
    pub successes: Vec<PathBuf>,
    /// Failed entries (completion order)
    pub failures: Vec<DownloadFailure>,
}

impl BatchResult {
    /// Add one terminal outcome
    pub fn record(&mut self, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Success { path } => self.successes.push(path),
            DownloadOutcome::Failure(failure) => self.failures.push(failure),
        }
    }

    /// Number of entries accounted for
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// True when nothing failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Append another batch's outcomes to this one
    pub fn merge(&mut self, other: BatchResult) {
        self.successes.extend(other.successes);
        self.failures.extend(other.failures);
    }
}

/// Event emitted during a batch
///
/// Events for a given entry arrive in lifecycle order: `Queued`, `Started`,
/// zero or more `Progress`, then exactly one of `Completed` or `Failed`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Entry submitted to the batch
    Queued {
        /// Statistical table ID
        stats_data_id: String,
    },

    /// Entry admitted past the concurrency limiter
    Started {
        /// Statistical table ID
        stats_data_id: String,
    },

    /// Bytes written so far
    Progress {
        /// Statistical table ID
        stats_data_id: String,
        /// Bytes received
        downloaded: u64,
        /// Content length, if the server sent one
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },

    /// Entry finished successfully
    Completed {
        /// Statistical table ID
        stats_data_id: String,
        /// Output path
        path: PathBuf,
    },

    /// Entry failed
    Failed {
        /// Statistical table ID
        stats_data_id: String,
        /// HTTP status, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
        /// Error message
        message: String,
    },
}

impl Event {
    /// Statistical table ID the event refers to
    pub fn stats_data_id(&self) -> &str {
        match self {
            Event::Queued { stats_data_id }
            | Event::Started { stats_data_id }
            | Event::Progress { stats_data_id, .. }
            | Event::Completed { stats_data_id, .. }
            | Event::Failed { stats_data_id, .. } => stats_data_id,
        }
    }

    /// True for `Completed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Completed { .. } | Event::Failed { .. })
    }
}
