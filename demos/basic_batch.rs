//! Basic batch example
//!
//! This example demonstrates the core functionality of estat-dl:
//! - Validating an entry list
//! - Creating the file and metadata engines
//! - Subscribing to events
//! - Printing the batch summary
//!
//! Usage: `cargo run --example basic_batch -- valid_urls.csv`
//! (set `ESTAT_API_KEY` if the list contains `DB` rows)

use std::path::PathBuf;

use estat_dl::config::{Config, DownloadConfig};
use estat_dl::{Event, FileDownloader, MetadataDownloader, validate_url_list};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let list = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("valid_urls.csv"));

    let config = Config {
        download: DownloadConfig {
            output_dir: "tmp_dl".into(),
            max_concurrent_downloads: 3,
            ..Default::default()
        },
        ..Default::default()
    };

    // Validate first; invalid rows are reported, not fatal
    let validation = validate_url_list(&list, &config)?;
    for (row, message) in &validation.invalid_rows {
        println!("✗ Row {}: {}", row, message);
    }
    if validation.is_empty() {
        println!("No valid entries in {}", list.display());
        return Ok(());
    }

    let entries = validation.valid_entries();
    let label = list.display().to_string();

    // Create file downloader and subscribe to events
    let files = FileDownloader::new(&config)?;
    let mut events = files.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Started { stats_data_id } => {
                    println!("⬇ {}", stats_data_id);
                }
                Event::Completed {
                    stats_data_id,
                    path,
                } => {
                    println!("✓ {} -> {}", stats_data_id, path.display());
                }
                Event::Failed {
                    stats_data_id,
                    message,
                    ..
                } => {
                    println!("✗ {}: {}", stats_data_id, message);
                }
                _ => {}
            }
        }
    });

    let result = files.download_all(&entries, &label).await;
    println!(
        "\nFiles: {} downloaded, {} failed",
        result.successes.len(),
        result.failures.len()
    );
    for failure in &result.failures {
        println!("  ✗ {}", failure);
    }

    if !validation.metadata_entries.is_empty() {
        let metadata = MetadataDownloader::new(&config)?;
        let result = metadata.download_all(&entries, &label).await;
        println!(
            "Metadata: {} downloaded, {} failed",
            result.successes.len(),
            result.failures.len()
        );
        for failure in &result.failures {
            println!("  ✗ {}", failure);
        }
    }

    Ok(())
}
