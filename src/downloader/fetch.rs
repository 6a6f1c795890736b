//! Single-entry transfer: stream the body to disk, then normalize CSV to UTF-8.

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

use crate::encoding::EncodingResolver;
use crate::error::DownloadError;
use crate::types::{Event, FileEntry, FileFormat};

/// Fetch one file entry to `path`
///
/// The body is written chunk by chunk, so payload size is not bounded by
/// memory. For CSV entries the written bytes are then decoded and the file is
/// rewritten as UTF-8. If decoding fails the raw bytes stay on disk and the
/// entry still fails.
pub(super) async fn fetch_file(
    client: reqwest::Client,
    resolver: EncodingResolver,
    event_tx: broadcast::Sender<Event>,
    entry: FileEntry,
    path: PathBuf,
) -> Result<PathBuf, DownloadError> {
    let response = client
        .get(entry.url.clone())
        .send()
        .await
        .map_err(DownloadError::Transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::from_status(status));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let total = response.content_length();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(&path).await?;
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(DownloadError::Transport)?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        let _ = event_tx.send(Event::Progress {
            stats_data_id: entry.stats_data_id.to_string(),
            downloaded,
            total,
        });
    }
    file.flush().await?;
    drop(file);

    tracing::debug!(
        stats_data_id = %entry.stats_data_id,
        bytes = downloaded,
        path = %path.display(),
        "Body written"
    );

    if entry.format == FileFormat::Csv {
        let raw = tokio::fs::read(&path).await?;
        let decoded = resolver
            .decode(&raw, content_type.as_deref())
            .map_err(|source| DownloadError::Encoding {
                status: status.as_u16(),
                source,
            })?;
        tracing::debug!(
            stats_data_id = %entry.stats_data_id,
            encoding = decoded.detection.encoding.name(),
            source = ?decoded.detection.source,
            declared = content_type.as_deref().unwrap_or("-"),
            "Converted CSV to UTF-8"
        );
        tokio::fs::write(&path, decoded.text.as_bytes()).await?;
    }

    Ok(path)
}
