use super::test_helpers::*;
use super::*;
use crate::error::FailureKind;
use crate::types::{DownloadFailure, FileFormat};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn failure_for<'a>(result: &'a BatchResult, target: &str) -> &'a DownloadFailure {
    result
        .failures
        .iter()
        .find(|f| f.target == target)
        .unwrap_or_else(|| panic!("no failure recorded for {target}"))
}

#[tokio::test]
async fn test_shift_jis_csv_is_rewritten_as_utf8() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/0003410379.csv"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(SJIS_CSV, "text/csv; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let (downloader, temp_dir) = create_test_downloader(3);
    let entries = vec![file_entry(
        "0003410379",
        FileFormat::Csv,
        &format!("{}/data/0003410379.csv", server.uri()),
    )];

    let result = downloader.download_all(&entries, "lists/urls.csv").await;

    assert!(result.is_success(), "failures: {:?}", result.failures);
    let expected = temp_dir.path().join("out/urls/0003410379.csv");
    assert_eq!(result.successes, vec![expected.clone()]);
    let content = std::fs::read_to_string(&expected).unwrap();
    assert_eq!(content, "テスト,データ,123");
}

#[tokio::test]
async fn test_survey_date_adds_subdirectory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a,b\n1,2\n"))
        .mount(&server)
        .await;

    let (downloader, temp_dir) = create_test_downloader(3);
    let mut entry = file_entry(
        "0000000001",
        FileFormat::Csv,
        &format!("{}/x.csv", server.uri()),
    );
    if let Entry::File(file) = &mut entry {
        file.survey_date = Some("2020".to_string());
    }

    let result = downloader.download_all(&[entry], "urls.csv").await;

    assert!(result.is_success());
    let expected = temp_dir.path().join("out/urls/2020/0000000001.csv");
    assert!(expected.exists());
    assert_eq!(std::fs::read_to_string(expected).unwrap(), "a,b\n1,2\n");
}

#[tokio::test]
async fn test_xls_is_stored_verbatim() {
    // Not a valid workbook, and not valid text in any charset either
    let body: Vec<u8> = vec![0xD0, 0xCF, 0x11, 0xE0, 0x00, 0xFF, 0x80, 0x81, 0x00];
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body.clone(), "application/vnd.ms-excel"),
        )
        .mount(&server)
        .await;

    let (downloader, temp_dir) = create_test_downloader(3);
    let entries = vec![file_entry(
        "0000000002",
        FileFormat::Xls,
        &format!("{}/book.xls", server.uri()),
    )];

    let result = downloader.download_all(&entries, "urls.csv").await;

    assert!(result.is_success());
    let written = std::fs::read(temp_dir.path().join("out/urls/0000000002.xlsx")).unwrap();
    assert_eq!(written, body);
}

#[tokio::test]
async fn test_http_error_is_recorded_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (downloader, temp_dir) = create_test_downloader(3);
    let url = format!("{}/missing.csv", server.uri());
    let entries = vec![file_entry("0000000003", FileFormat::Csv, &url)];

    let result = downloader.download_all(&entries, "urls.csv").await;

    assert!(result.successes.is_empty());
    let failure = failure_for(&result, &url);
    assert_eq!(failure.status_code, Some(404));
    assert_eq!(failure.message, "HTTP error: Not Found");
    assert_eq!(failure.kind, FailureKind::HttpStatus);
    assert_eq!(
        failure.to_string(),
        format!("{url} (Status: 404): HTTP error: Not Found")
    );
    assert!(!temp_dir.path().join("out/urls/0000000003.csv").exists());
}

#[tokio::test]
async fn test_unreachable_host_is_transport_failure_without_status() {
    let (downloader, _temp_dir) = create_test_downloader(3);
    let url = "http://127.0.0.1:1/unreachable.csv";
    let entries = vec![file_entry("0000000004", FileFormat::Csv, url)];

    let result = downloader.download_all(&entries, "urls.csv").await;

    let failure = failure_for(&result, url);
    assert_eq!(failure.status_code, None);
    assert_eq!(failure.kind, FailureKind::Transport);
    assert!(failure.message.starts_with("Request failed: "));
}

#[tokio::test]
async fn test_undecodable_csv_fails_and_keeps_raw_file() {
    let body: &[u8] = b"\x00\x01\x02\x03\x04\x05\x06\x07\xff\xfe\xfd\x10\x11\x12";
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/csv"))
        .mount(&server)
        .await;

    let (downloader, temp_dir) = create_test_downloader(3);
    let url = format!("{}/noise.csv", server.uri());
    let entries = vec![file_entry("0000000005", FileFormat::Csv, &url)];

    let result = downloader.download_all(&entries, "urls.csv").await;

    let failure = failure_for(&result, &url);
    assert_eq!(failure.status_code, Some(200));
    assert_eq!(failure.kind, FailureKind::Encoding);
    assert!(failure.message.starts_with("Encoding conversion failed: "));

    let raw = std::fs::read(temp_dir.path().join("out/urls/0000000005.csv")).unwrap();
    assert_eq!(raw, body);
}

#[tokio::test]
async fn test_concurrency_limit_bounds_in_flight_downloads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("x,y\n")
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let (downloader, _temp_dir) = create_test_downloader(2);
    let mut events = downloader.subscribe();
    let entries: Vec<Entry> = (0..6)
        .map(|i| {
            file_entry(
                &format!("{i:010}"),
                FileFormat::Csv,
                &format!("{}/{i}.csv", server.uri()),
            )
        })
        .collect();

    let result = downloader.download_all(&entries, "urls.csv").await;
    assert_eq!(result.successes.len(), 6);

    let mut in_flight = 0i32;
    let mut peak = 0i32;
    while let Ok(event) = events.try_recv() {
        match event {
            Event::Started { .. } => {
                in_flight += 1;
                peak = peak.max(in_flight);
            }
            Event::Completed { .. } | Event::Failed { .. } => in_flight -= 1,
            _ => {}
        }
    }
    assert_eq!(in_flight, 0);
    assert_eq!(peak, 2);
}

#[tokio::test]
async fn test_mixed_batch_reports_every_file_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken.csv"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (downloader, _temp_dir) = create_test_downloader(3);
    let entries = vec![
        file_entry("0000000010", FileFormat::Csv, &format!("{}/ok.csv", server.uri())),
        file_entry(
            "0000000011",
            FileFormat::Csv,
            &format!("{}/broken.csv", server.uri()),
        ),
        metadata_entry("0000000012"),
        file_entry("0000000013", FileFormat::Xls, &format!("{}/ok.csv", server.uri())),
    ];

    let result = downloader.download_all(&entries, "urls.csv").await;

    // Metadata entries belong to the other engine
    assert_eq!(result.total(), 3);
    assert_eq!(result.successes.len(), 2);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].status_code, Some(500));
}

#[tokio::test]
async fn test_events_are_emitted_in_lifecycle_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a,b\n"))
        .mount(&server)
        .await;

    let (downloader, _temp_dir) = create_test_downloader(1);
    let mut events = downloader.subscribe();
    let entries = vec![file_entry(
        "0000000020",
        FileFormat::Csv,
        &format!("{}/a.csv", server.uri()),
    )];

    downloader.download_all(&entries, "urls.csv").await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.first(), Some(Event::Queued { .. })));
    assert!(matches!(seen.get(1), Some(Event::Started { .. })));
    assert!(matches!(seen.last(), Some(Event::Completed { .. })));
    assert!(
        seen.iter()
            .any(|e| matches!(e, Event::Progress { downloaded: 4, .. }))
    );
    assert_eq!(seen.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[test]
fn test_zero_concurrency_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(&temp_dir, 0);
    match FileDownloader::new(&config) {
        Err(Error::Config { key, .. }) => {
            assert_eq!(key.as_deref(), Some("max_concurrent_downloads"))
        }
        Err(other) => panic!("Expected Config error, got {other:?}"),
        Ok(_) => panic!("Expected Config error"),
    }
}

#[test]
fn test_destination_layout() {
    let (downloader, _temp_dir) = create_test_downloader(1);
    let Entry::File(mut entry) =
        file_entry("0003410379", FileFormat::Xls, "https://www.e-stat.go.jp/a")
    else {
        unreachable!()
    };
    let batch = std::path::Path::new("/out/urls");
    assert_eq!(
        downloader.destination(&entry, batch),
        PathBuf::from("/out/urls/0003410379.xlsx")
    );
    entry.survey_date = Some("2021-04".to_string());
    assert_eq!(
        downloader.destination(&entry, batch),
        PathBuf::from("/out/urls/2021-04/0003410379.xlsx")
    );
}
