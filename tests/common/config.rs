//! Test configuration helpers pointing both engines at a local mock server

use estat_dl::Config;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// Application ID used by tests that exercise the metadata engine
pub const TEST_API_KEY: &str = "integration-app-id";

/// Path of the mocked metadata endpoint
pub const METADATA_PATH: &str = "/rest/3.0/app/json/getMetaInfo";

/// Config that accepts URLs on the mock server, writes into `temp_dir` and
/// sends metadata requests to the mock server
pub fn mock_config(server: &MockServer, temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.output_dir = output_root(temp_dir);
    config.download.timeout = Duration::from_secs(10);
    config.metadata.api_key = Some(TEST_API_KEY.to_string());
    config.metadata.endpoint = format!("{}{METADATA_PATH}", server.uri());
    config.metadata.timeout = Duration::from_secs(10);
    config.validation.provider_domain = "127.0.0.1".to_string();
    config
}

/// Root of all batch directories inside `temp_dir`
pub fn output_root(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("tmp_dl")
}

/// Write an entry list named `name` into `temp_dir`
pub fn write_entry_list(temp_dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = temp_dir.path().join(name);
    std::fs::write(&path, content).expect("failed to write entry list");
    path
}

/// Read a downloaded file as UTF-8
pub fn read_output(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}
