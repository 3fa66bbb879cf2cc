//! Integration tests for complete runs
//!
//! These tests use wiremock to serve a small music site and drive the full
//! cycle: staged traversal, then downloading into a temporary directory.

use recursive_dl::config::{parse_config_str, validate, Config};
use recursive_dl::{run, DlError, DownloadStatus, FetchError};
use std::path::Path;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves an HTML page at `route`
async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("<html><body>{}</body></html>", body))
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Serves a binary file at `route`
async fn mount_file(server: &MockServer, route: &str, bytes: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(bytes.to_vec())
                .insert_header("content-type", "audio/flac"),
        )
        .mount(server)
        .await;
}

/// Builds a configuration the way the binary does, from TOML
fn test_config(search: &[&str], output: &Path, workers: usize) -> Config {
    let search_list = search
        .iter()
        .map(|s| format!("{:?}", s))
        .collect::<Vec<_>>()
        .join(", ");
    let toml = format!(
        r#"
        [crawl]
        search = [{}]
        workers = {}
        output = {:?}

        [http]
        page-timeout-secs = 5
        download-timeout-secs = 5
        "#,
        search_list,
        workers,
        output.display().to_string()
    );

    let config = parse_config_str(&toml).expect("test config should parse");
    validate(&config).expect("test config should be valid");
    config
}

fn seed(server: &MockServer) -> Url {
    Url::parse(&format!("{}/", server.uri())).unwrap()
}

/// Seed with two album pages and a stray text file
async fn mount_album_site(server: &MockServer) {
    mount_page(
        server,
        "/",
        r#"<a href="/album/a.mp3">A</a>
           <a href="/album/b.mp3">B</a>
           <a href="/notes.txt">notes</a>"#,
    )
    .await;
    mount_page(server, "/album/a.mp3", r#"<a href="/files/a.flac">lossless</a>"#).await;
    mount_page(
        server,
        "/album/b.mp3",
        r#"<a href="../files/b.flac">lossless</a><a href="/album/a.mp3">other</a>"#,
    )
    .await;
    mount_file(server, "/files/a.flac", b"fLaC-a").await;
    mount_file(server, "/files/b.flac", b"fLaC-bb").await;
}

#[tokio::test]
async fn test_full_run_downloads_final_stage() {
    let server = MockServer::start().await;
    mount_album_site(&server).await;
    Mock::given(method("GET"))
        .and(path("/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("never fetched"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("downloads");
    let config = test_config(&["*.mp3", "*.flac"], &out, 3);

    let output = run(&config, &seed(&server), false).await.unwrap();

    let found: Vec<&str> = output.crawl.urls.iter().map(|u| u.path()).collect();
    assert_eq!(found, vec!["/files/a.flac", "/files/b.flac"]);
    assert_eq!(output.crawl.stages.len(), 2);
    assert_eq!(output.crawl.stages[0].matched, 2);

    assert_eq!(output.downloads.len(), 2);
    assert!(output.downloads.iter().all(|o| o.success()));
    assert_eq!(std::fs::read(out.join("a.flac")).unwrap(), b"fLaC-a");
    assert_eq!(std::fs::read(out.join("b.flac")).unwrap(), b"fLaC-bb");
}

#[tokio::test]
async fn test_second_run_reports_already_present() {
    let server = MockServer::start().await;
    mount_album_site(&server).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&["*.mp3", "*.flac"], dir.path(), 2);

    let first = run(&config, &seed(&server), false).await.unwrap();
    let second = run(&config, &seed(&server), false).await.unwrap();

    assert_eq!(first.crawl, second.crawl);
    assert!(second
        .downloads
        .iter()
        .all(|o| o.status == DownloadStatus::AlreadyPresent));
}

#[tokio::test]
async fn test_fallback_keeps_self_links() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="a.mp3">A</a><a href="b.mp3">B</a>"#).await;
    mount_page(&server, "/a.mp3", r#"<a href="a.mp3">this track</a>"#).await;
    mount_page(&server, "/b.mp3", r#"<a href="/b.mp3">this track</a>"#).await;

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("unused");
    let config = test_config(&["*.mp3", "*.flac > *.mp3"], &out, 4);

    let output = run(&config, &seed(&server), true).await.unwrap();

    let found: Vec<&str> = output.crawl.urls.iter().map(|u| u.path()).collect();
    assert_eq!(found, vec!["/a.mp3", "/b.mp3"]);
    assert_eq!(output.crawl.stages[1].fallback_pages, 2);

    // Dry runs never touch the output directory
    assert!(output.downloads.is_empty());
    assert!(!out.exists());
}

#[tokio::test]
async fn test_failed_page_is_skipped() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/ok.mp3">ok</a><a href="/broken.mp3">broken</a>"#).await;
    mount_page(&server, "/ok.mp3", r#"<a href="/ok.flac">flac</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/broken.mp3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_file(&server, "/ok.flac", b"fLaC").await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&["*.mp3", "*.flac"], dir.path(), 2);

    let output = run(&config, &seed(&server), false).await.unwrap();

    assert_eq!(output.crawl.len(), 1);
    assert_eq!(output.crawl.stages[1].pages_failed, 1);
    assert_eq!(output.downloads.len(), 1);
    assert!(dir.path().join("ok.flac").exists());
}

#[tokio::test]
async fn test_no_matches_is_not_an_error() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/readme.txt">readme</a>"#).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&["*.mp3", "*.flac"], dir.path(), 2);

    let output = run(&config, &seed(&server), false).await.unwrap();

    assert!(output.crawl.is_empty());
    assert_eq!(output.crawl.stages.len(), 1);
    assert!(output.downloads.is_empty());
}

#[tokio::test]
async fn test_unreachable_seed_fails_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&["*.mp3"], dir.path(), 1);

    let err = run(&config, &seed(&server), false).await.unwrap_err();
    assert!(matches!(
        err,
        DlError::SeedUnreachable {
            source: FetchError::Status { status: 404, .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_malformed_pattern_is_rejected() {
    let server = MockServer::start().await;
    let mut config = Config::default();
    config.crawl.search = vec!["*.flac>".to_string()];

    let err = run(&config, &seed(&server), true).await.unwrap_err();
    assert!(matches!(err, DlError::Pattern(_)));
}
