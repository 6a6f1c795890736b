//! File download engine
//!
//! [`FileDownloader`] fetches every [`FileEntry`](crate::types::FileEntry) of a
//! batch concurrently (bounded by `max_concurrent_downloads`), streams each
//! body to `{output_dir}/{batch}/[{survey_date}/]{id}.{csv|xlsx}`, converts
//! CSV payloads to UTF-8 and reports one outcome per entry.
//!
//! - [`fetch`] - Single-entry transfer and CSV normalization

mod fetch;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::batch::{self, Job};
use crate::config::{Config, DownloadConfig};
use crate::encoding::EncodingResolver;
use crate::error::{Error, Result};
use crate::types::{BatchResult, Entry, Event, FileEntry};
use crate::utils;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Concurrent file downloader (cloneable - shared state is Arc-wrapped)
#[derive(Clone)]
pub struct FileDownloader {
    /// Download settings
    pub(crate) config: Arc<DownloadConfig>,
    /// HTTP client with the configured per-request timeout
    pub(crate) client: reqwest::Client,
    /// CSV charset resolver
    pub(crate) resolver: EncodingResolver,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl FileDownloader {
    /// Create a downloader from the download section of `config`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `max_concurrent_downloads` is zero, or
    /// [`Error::Network`] if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let config = config.download.clone();
        if config.max_concurrent_downloads == 0 {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be at least 1".to_string(),
                key: Some("max_concurrent_downloads".to_string()),
            });
        }

        let client = utils::http_client(config.timeout)?;
        let resolver = EncodingResolver::new(config.encoding_policy);
        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            client,
            resolver,
            event_tx,
        })
    }

    /// Subscribe to download events
    ///
    /// Receivers only see events sent after they subscribed.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Where `entry` is written for a batch rooted at `batch_dir`
    pub fn destination(&self, entry: &FileEntry, batch_dir: &Path) -> PathBuf {
        let dir = match &entry.survey_date {
            Some(date) => batch_dir.join(date),
            None => batch_dir.to_path_buf(),
        };
        dir.join(entry.filename())
    }

    /// Download every file entry in `entries`
    ///
    /// `batch_label` is usually the entry list's file name; its stem names the
    /// batch directory. Metadata entries are skipped. Returns after every
    /// entry has either been written or recorded as failed; individual
    /// failures never abort the batch.
    pub async fn download_all(&self, entries: &[Entry], batch_label: &str) -> BatchResult {
        let batch_dir = utils::batch_dir(&self.config.output_dir, batch_label);

        let jobs: Vec<Job> = entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::File(file) => Some(file),
                Entry::Metadata(_) => None,
            })
            .map(|entry| {
                let path = self.destination(entry, &batch_dir);
                Job {
                    stats_data_id: entry.stats_data_id.to_string(),
                    target: entry.url.to_string(),
                    work: Box::pin(fetch::fetch_file(
                        self.client.clone(),
                        self.resolver,
                        self.event_tx.clone(),
                        entry.clone(),
                        path,
                    )),
                }
            })
            .collect();

        tracing::info!(
            batch = %batch_dir.display(),
            entries = jobs.len(),
            max_concurrent = self.config.max_concurrent_downloads,
            "Starting file batch"
        );

        let result =
            batch::run_batch(jobs, self.config.max_concurrent_downloads, &self.event_tx).await;

        tracing::info!(
            succeeded = result.successes.len(),
            failed = result.failures.len(),
            "File batch finished"
        );
        result
    }
}
