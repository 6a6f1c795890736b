//! Configuration types for estat-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Environment variable holding the e-Stat application ID
pub const API_KEY_ENV: &str = "ESTAT_API_KEY";

/// Which source of charset information is consulted first for CSV payloads
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingPolicy {
    /// Ignore the Content-Type charset and sniff the bytes (Shift-JIS, then UTF-8, then statistics)
    #[default]
    ContentFirst,
    /// Try the Content-Type charset first, then fall back to sniffing
    HeaderFirst,
}

/// File download behavior (output location, concurrency, timeouts)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory for all batches (default: "./tmp_dl")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum concurrent file transfers (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Timeout for each file request, including the body (default: 600 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Charset detection policy for CSV payloads
    #[serde(default)]
    pub encoding_policy: EncodingPolicy,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            timeout: default_download_timeout(),
            encoding_policy: EncodingPolicy::default(),
        }
    }
}

/// Metadata API settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// e-Stat application ID. When `None`, [`API_KEY_ENV`] is read at engine construction.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Metadata endpoint (default: the e-Stat `getMetaInfo` JSON API)
    #[serde(default = "default_metadata_endpoint")]
    pub endpoint: String,

    /// Maximum concurrent metadata requests (default: 5)
    #[serde(default = "default_metadata_concurrent")]
    pub max_concurrent_requests: usize,

    /// Timeout for each metadata request (default: 30 seconds)
    #[serde(default = "default_metadata_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_metadata_endpoint(),
            max_concurrent_requests: default_metadata_concurrent(),
            timeout: default_metadata_timeout(),
        }
    }
}

impl MetadataConfig {
    /// Resolve the API key from this config, falling back to the process environment
    ///
    /// Blank values count as absent.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

/// Entry list validation settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Host that file URLs must belong to, directly or as a subdomain (default: "e-stat.go.jp")
    #[serde(default = "default_provider_domain")]
    pub provider_domain: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            provider_domain: default_provider_domain(),
        }
    }
}

/// Main configuration for estat-dl
///
/// - [`download`](DownloadConfig) - output directory, file concurrency, encoding policy
/// - [`metadata`](MetadataConfig) - API key, endpoint, metadata concurrency
/// - [`validation`](ValidationConfig) - provider domain
///
/// Download settings are flattened so the serialized form keeps them at the top level.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// File download settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Metadata API settings
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Entry list validation settings
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl Config {
    /// Root directory for all batches
    pub fn output_dir(&self) -> &PathBuf {
        &self.download.output_dir
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./tmp_dl")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_metadata_endpoint() -> String {
    "https://api.e-stat.go.jp/rest/3.0/app/json/getMetaInfo".to_string()
}

fn default_metadata_concurrent() -> usize {
    5
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_provider_domain() -> String {
    "e-stat.go.jp".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
