//! Parallel file transfer
//!
//! Runs in two passes over the worker pool. The first asks the server for
//! each file's name with a `HEAD` request; the second streams the bodies to
//! disk. Names are settled for the whole batch between the passes so that
//! clashes resolve the same way on every run.

use super::naming::{assign_names, base_name, filename_from_disposition};
use super::{DownloadOutcome, DownloadStatus};
use crate::config::HttpConfig;
use crate::crawler::run_pool;
use crate::FetchError;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::Client;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Downloads files into one output directory
pub struct Downloader {
    client: Client,
    output_dir: PathBuf,
    timeout: Duration,
}

impl Downloader {
    /// Creates a downloader writing to `output_dir`
    pub fn new(client: Client, output_dir: impl Into<PathBuf>, config: &HttpConfig) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
            timeout: Duration::from_secs(config.download_timeout_secs),
        }
    }

    /// The directory files are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Downloads every URL with at most `workers` transfers in flight
    ///
    /// Returns exactly one outcome per URL, sorted by URL. A failure affects
    /// only its own URL.
    pub async fn download_all(&self, urls: &BTreeSet<Url>, workers: usize) -> Vec<DownloadOutcome> {
        if urls.is_empty() {
            return Vec::new();
        }

        let names = self.resolve_names(urls, workers).await;
        let jobs: Vec<(Url, PathBuf)> = names
            .into_iter()
            .map(|(url, name)| (url, self.output_dir.join(name)))
            .collect();

        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            let message = format!(
                "cannot create output directory {}: {}",
                self.output_dir.display(),
                e
            );
            tracing::error!("{}", message);
            return jobs
                .into_iter()
                .map(|(url, path)| DownloadOutcome {
                    url,
                    path,
                    status: DownloadStatus::Failed(message.clone()),
                })
                .collect();
        }

        tracing::info!(
            "Downloading {} file(s) to {}",
            jobs.len(),
            self.output_dir.display()
        );

        let client = self.client.clone();
        let timeout = self.timeout;
        let statuses = run_pool(jobs.clone(), workers, move |(url, path)| {
            let client = client.clone();
            async move { transfer(&client, &url, &path, timeout).await }
        })
        .await;

        let mut outcomes: Vec<DownloadOutcome> = jobs
            .into_iter()
            .zip(statuses)
            .map(|((url, path), status)| DownloadOutcome {
                url,
                path,
                status: status.unwrap_or_else(|| {
                    DownloadStatus::Failed("worker stopped unexpectedly".to_string())
                }),
            })
            .collect();

        outcomes.sort_by(|a, b| a.url.cmp(&b.url));
        outcomes
    }

    /// Picks a unique file name for every URL
    async fn resolve_names(&self, urls: &BTreeSet<Url>, workers: usize) -> Vec<(Url, String)> {
        let items: Vec<Url> = urls.iter().cloned().collect();
        let client = self.client.clone();
        let timeout = self.timeout;

        let dispositions = run_pool(items.clone(), workers, move |url| {
            let client = client.clone();
            async move { head_filename(&client, &url, timeout).await }
        })
        .await;

        let named = items
            .into_iter()
            .zip(dispositions)
            .map(|(url, disposition)| {
                let name = base_name(&url, disposition.flatten().as_deref());
                (url, name)
            })
            .collect();

        assign_names(named)
    }
}

/// Asks the server for a file name; any failure means "no name offered"
async fn head_filename(client: &Client, url: &Url, timeout: Duration) -> Option<String> {
    let response = match client.head(url.clone()).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("HEAD {} failed: {}", url, e);
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::debug!("HEAD {} returned {}", url, response.status());
        return None;
    }

    response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition)
}

/// Downloads one URL to `path`
async fn transfer(client: &Client, url: &Url, path: &Path, timeout: Duration) -> DownloadStatus {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if tokio::fs::metadata(path).await.is_ok() {
        tracing::info!("Already present: {}", name);
        return DownloadStatus::AlreadyPresent;
    }

    let partial = partial_path(path);
    match stream_to_file(client, url, &partial, timeout).await {
        Ok(bytes) => match tokio::fs::rename(&partial, path).await {
            Ok(()) => {
                tracing::info!("Downloaded {} ({} bytes)", name, bytes);
                DownloadStatus::Downloaded { bytes }
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                let message = format!("could not finalize {}: {}", path.display(), e);
                tracing::warn!("Failed {}: {}", url, message);
                DownloadStatus::Failed(message)
            }
        },
        Err(message) => {
            let _ = tokio::fs::remove_file(&partial).await;
            tracing::warn!("Failed {}: {}", url, message);
            DownloadStatus::Failed(message)
        }
    }
}

/// Streams a response body into `partial`, returning the byte count
async fn stream_to_file(
    client: &Client,
    url: &Url,
    partial: &Path,
    timeout: Duration,
) -> Result<u64, String> {
    let url_str = url.as_str();

    let mut response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url_str, e).to_string())?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url_str.to_string(),
            status: status.as_u16(),
        }
        .to_string());
    }

    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(|e| format!("could not create {}: {}", partial.display(), e))?;

    let mut bytes: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| FetchError::from_reqwest(url_str, e).to_string())?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("could not write {}: {}", partial.display(), e))?;
        bytes += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| format!("could not write {}: {}", partial.display(), e))?;

    Ok(bytes)
}

/// `<path>.part`
fn partial_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::build_http_client;
    use crate::download::url_hash;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader(dir: &Path) -> Downloader {
        let config = HttpConfig::default();
        Downloader::new(build_http_client(&config).unwrap(), dir, &config)
    }

    fn urls(server: &MockServer, paths: &[&str]) -> BTreeSet<Url> {
        paths
            .iter()
            .map(|p| Url::parse(&format!("{}{}", server.uri(), p)).unwrap())
            .collect()
    }

    async fn serve(server: &MockServer, route: &str, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .mount(server)
            .await;
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("out/song.mp3")),
            PathBuf::from("out/song.mp3.part")
        );
    }

    #[tokio::test]
    async fn test_download_files() {
        let server = MockServer::start().await;
        serve(&server, "/music/a.mp3", b"first file").await;
        serve(&server, "/music/b.mp3", b"second").await;
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested/out");

        let outcomes = downloader(&out)
            .download_all(&urls(&server, &["/music/b.mp3", "/music/a.mp3"]), 2)
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].url.as_str().ends_with("/a.mp3"));
        assert_eq!(outcomes[0].status, DownloadStatus::Downloaded { bytes: 10 });
        assert_eq!(std::fs::read(out.join("a.mp3")).unwrap(), b"first file");
        assert_eq!(std::fs::read(out.join("b.mp3")).unwrap(), b"second");
        assert!(!out.join("a.mp3.part").exists());
    }

    #[tokio::test]
    async fn test_content_disposition_name() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/get"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-disposition", "attachment; filename=\"Real Name.flac\""),
            )
            .mount(&server)
            .await;
        serve(&server, "/get", b"flac").await;
        let dir = TempDir::new().unwrap();

        let outcomes = downloader(dir.path())
            .download_all(&urls(&server, &["/get"]), 1)
            .await;

        assert_eq!(outcomes[0].path, dir.path().join("Real Name.flac"));
        assert!(dir.path().join("Real Name.flac").exists());
    }

    #[tokio::test]
    async fn test_colliding_names_get_hash_suffix() {
        let server = MockServer::start().await;
        serve(&server, "/a/song.mp3", b"from a").await;
        serve(&server, "/b/song.mp3", b"from b").await;
        let dir = TempDir::new().unwrap();
        let batch = urls(&server, &["/a/song.mp3", "/b/song.mp3"]);
        let second = batch.iter().nth(1).unwrap().clone();

        let outcomes = downloader(dir.path()).download_all(&batch, 4).await;

        assert!(outcomes.iter().all(|o| o.success()));
        let hashed = format!("song-{}.mp3", url_hash(&second));
        assert_eq!(std::fs::read(dir.path().join("song.mp3")).unwrap(), b"from a");
        assert_eq!(std::fs::read(dir.path().join(hashed)).unwrap(), b"from b");
    }

    #[tokio::test]
    async fn test_existing_file_is_not_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .expect(0)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"old").unwrap();

        let outcomes = downloader(dir.path())
            .download_all(&urls(&server, &["/a.mp3"]), 1)
            .await;

        assert_eq!(outcomes[0].status, DownloadStatus::AlreadyPresent);
        assert_eq!(std::fs::read(dir.path().join("a.mp3")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let server = MockServer::start().await;
        serve(&server, "/ok.mp3", b"fine").await;
        Mock::given(method("GET"))
            .and(path("/missing.mp3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        let outcomes = downloader(dir.path())
            .download_all(&urls(&server, &["/ok.mp3", "/missing.mp3"]), 2)
            .await;

        let missing = outcomes
            .iter()
            .find(|o| o.url.path() == "/missing.mp3")
            .unwrap();
        assert!(!missing.success());
        assert!(missing.error().unwrap().contains("404"));
        assert!(!dir.path().join("missing.mp3").exists());
        assert!(!dir.path().join("missing.mp3.part").exists());

        let ok = outcomes.iter().find(|o| o.url.path() == "/ok.mp3").unwrap();
        assert!(ok.success());
    }

    #[tokio::test]
    async fn test_worker_count_does_not_change_outcomes() {
        let server = MockServer::start().await;
        let paths = ["/1.mp3", "/2.mp3", "/3.mp3", "/4.mp3", "/5.mp3"];
        for p in &paths[..4] {
            serve(&server, p, p.as_bytes()).await;
        }
        let batch = urls(&server, &paths);

        let summarize = |outcomes: Vec<DownloadOutcome>| -> Vec<(Url, bool)> {
            outcomes
                .into_iter()
                .map(|o| {
                    let ok = o.success();
                    (o.url, ok)
                })
                .collect()
        };

        let serial_dir = TempDir::new().unwrap();
        let serial = downloader(serial_dir.path()).download_all(&batch, 1).await;
        let parallel_dir = TempDir::new().unwrap();
        let parallel = downloader(parallel_dir.path()).download_all(&batch, 8).await;

        assert_eq!(serial.len(), paths.len());
        assert_eq!(summarize(serial), summarize(parallel));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("never-created");
        let outcomes = downloader(&out).download_all(&BTreeSet::new(), 4).await;
        assert!(outcomes.is_empty());
        assert!(!out.exists());
    }
}
