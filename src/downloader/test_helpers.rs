//! Shared test helpers for creating engines and entries in tests.

use crate::config::Config;
use crate::downloader::FileDownloader;
use crate::types::{Entry, FileEntry, FileFormat, MetadataEntry, StatsDataId};
use tempfile::tempdir;

/// Helper to create a test FileDownloader writing into a fresh temp directory.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) fn create_test_downloader(max_concurrent: usize) -> (FileDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(&temp_dir, max_concurrent);
    let downloader = FileDownloader::new(&config).unwrap();
    (downloader, temp_dir)
}

/// Config rooted in `temp_dir` with short timeouts and the given file concurrency
pub(crate) fn test_config(temp_dir: &tempfile::TempDir, max_concurrent: usize) -> Config {
    let mut config = Config::default();
    config.download.output_dir = temp_dir.path().join("out");
    config.download.max_concurrent_downloads = max_concurrent;
    config.download.timeout = std::time::Duration::from_secs(10);
    config.metadata.timeout = std::time::Duration::from_secs(10);
    config
}

/// A file entry pointing at `url`
pub(crate) fn file_entry(id: &str, format: FileFormat, url: &str) -> Entry {
    Entry::File(FileEntry {
        url: url::Url::parse(url).unwrap(),
        format,
        stats_data_id: StatsDataId::parse(id).unwrap(),
        title: None,
        description: None,
        survey_date: None,
    })
}

/// A metadata entry for `id`
pub(crate) fn metadata_entry(id: &str) -> Entry {
    Entry::Metadata(MetadataEntry {
        stats_data_id: StatsDataId::parse(id).unwrap(),
        title: Some("家計調査".to_string()),
        description: None,
    })
}

/// `テスト,データ,123` in Shift_JIS
pub(crate) const SJIS_CSV: &[u8] = b"\x83\x65\x83\x58\x83\x67,\x83\x66\x81\x5b\x83\x5e,123";
