//! Utility functions for output paths and HTTP client setup

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Batch directory name used when a label has no usable file stem
pub const DEFAULT_BATCH_NAME: &str = "estat_data";

/// Directory name for a batch: the label's file name without extension
///
/// # Examples
///
/// ```
/// use estat_dl::utils::batch_stem;
///
/// assert_eq!(batch_stem("lists/urls_2024.csv"), "urls_2024");
/// assert_eq!(batch_stem("urls"), "urls");
/// assert_eq!(batch_stem(""), "estat_data");
/// ```
#[must_use]
pub fn batch_stem(batch_label: &str) -> String {
    Path::new(batch_label)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| DEFAULT_BATCH_NAME.to_string())
}

/// `{output_dir}/{batch_stem(batch_label)}`
#[must_use]
pub fn batch_dir(output_dir: &Path, batch_label: &str) -> PathBuf {
    output_dir.join(batch_stem(batch_label))
}

/// Build the shared HTTP client for an engine
///
/// `timeout` bounds each whole request, body included. Expiry surfaces as a
/// transport failure of that entry.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
