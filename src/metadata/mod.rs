//! Metadata fetch engine
//!
//! [`MetadataDownloader`] resolves each [`MetadataEntry`] against the keyed
//! JSON metadata API (`getMetaInfo`) and stores the response pretty-printed at
//! `{output_dir}/{batch}/{id}.meta.json`. Concurrency, events and failure
//! records work exactly as in the file engine.


use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::batch::{self, Job};
use crate::config::{API_KEY_ENV, Config, MetadataConfig};
use crate::error::{DownloadError, Error, Result};
use crate::types::{BatchResult, Entry, Event, MetadataEntry};
use crate::utils;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Concurrent metadata downloader (cloneable - shared state is Arc-wrapped)
#[derive(Clone)]
pub struct MetadataDownloader {
    config: Arc<MetadataConfig>,
    output_dir: PathBuf,
    endpoint: url::Url,
    // Never logged
    api_key: Arc<str>,
    client: reqwest::Client,
    event_tx: broadcast::Sender<Event>,
}

impl std::fmt::Debug for MetadataDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataDownloader")
            .field("endpoint", &self.endpoint.as_str())
            .field("output_dir", &self.output_dir)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl MetadataDownloader {
    /// Create a metadata downloader
    ///
    /// The API key comes from `config.metadata.api_key`, else from the
    /// `ESTAT_API_KEY` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no non-blank key is available, when the
    /// endpoint is not a valid URL, or when `max_concurrent_requests` is zero.
    /// No request is made in any of these cases.
    pub fn new(config: &Config) -> Result<Self> {
        let metadata = config.metadata.clone();

        let Some(api_key) = metadata.resolve_api_key() else {
            return Err(Error::Config {
                message: format!("{API_KEY_ENV} environment variable is not set"),
                key: Some(API_KEY_ENV.to_string()),
            });
        };

        let endpoint = url::Url::parse(&metadata.endpoint).map_err(|e| Error::Config {
            message: format!("invalid metadata endpoint '{}': {e}", metadata.endpoint),
            key: Some("metadata.endpoint".to_string()),
        })?;

        if metadata.max_concurrent_requests == 0 {
            return Err(Error::Config {
                message: "max_concurrent_requests must be at least 1".to_string(),
                key: Some("metadata.max_concurrent_requests".to_string()),
            });
        }

        let client = utils::http_client(metadata.timeout)?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(metadata),
            output_dir: config.output_dir().clone(),
            endpoint,
            api_key: Arc::from(api_key),
            client,
            event_tx,
        })
    }

    /// Subscribe to metadata events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Fetch metadata for every metadata entry in `entries`
    ///
    /// File entries are skipped. Failure records name the table ID.
    pub async fn download_all(&self, entries: &[Entry], batch_label: &str) -> BatchResult {
        let batch_dir = utils::batch_dir(&self.output_dir, batch_label);

        let jobs: Vec<Job> = entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Metadata(meta) => Some(meta),
                Entry::File(_) => None,
            })
            .map(|entry| Job {
                stats_data_id: entry.stats_data_id.to_string(),
                target: entry.stats_data_id.to_string(),
                work: Box::pin(fetch_metadata(
                    self.client.clone(),
                    self.endpoint.clone(),
                    Arc::clone(&self.api_key),
                    entry.clone(),
                    batch_dir.join(entry.filename()),
                )),
            })
            .collect();

        if jobs.is_empty() {
            return BatchResult::default();
        }

        tracing::info!(
            batch = %batch_dir.display(),
            entries = jobs.len(),
            max_concurrent = self.config.max_concurrent_requests,
            "Starting metadata batch"
        );

        let result =
            batch::run_batch(jobs, self.config.max_concurrent_requests, &self.event_tx).await;

        tracing::info!(
            succeeded = result.successes.len(),
            failed = result.failures.len(),
            "Metadata batch finished"
        );
        result
    }
}

async fn fetch_metadata(
    client: reqwest::Client,
    endpoint: url::Url,
    api_key: Arc<str>,
    entry: MetadataEntry,
    path: PathBuf,
) -> std::result::Result<PathBuf, DownloadError> {
    let response = client
        .get(endpoint)
        .query(&[
            ("appId", &*api_key),
            ("statsDataId", entry.stats_data_id.as_str()),
        ])
        .send()
        .await
        .map_err(DownloadError::Transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::from_status(status));
    }

    let body = response.bytes().await.map_err(DownloadError::Transport)?;
    let document: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| DownloadError::Unexpected(format!("invalid JSON response: {e}")))?;
    let pretty = serde_json::to_string_pretty(&document)
        .map_err(|e| DownloadError::Unexpected(e.to_string()))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, pretty.as_bytes()).await?;

    tracing::debug!(
        stats_data_id = %entry.stats_data_id,
        bytes = pretty.len(),
        path = %path.display(),
        "Metadata written"
    );
    Ok(path)
}
