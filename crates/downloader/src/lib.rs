mod errors;
mod pool;
mod task;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub use errors::{DownloaderError, Result};
pub use pool::{DEFAULT_MAX_CONCURRENT, DEFAULT_RETAINED_FINISHED, DownloadPool};
pub use task::{DownloadTask, TaskSnapshot, TaskState};

use reqwest::{Client, StatusCode, header};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// progress notifications emitted while a download runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    Started {
        total_bytes: Option<u64>,
    },
    Progress {
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        elapsed: Duration,
    },
    Finished {
        downloaded_bytes: u64,
        elapsed: Duration,
    },
}

pub type EventSink = Arc<dyn Fn(DownloadEvent) + Send + Sync>;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub output: PathBuf,
    pub referer: Option<String>,
    pub connections: usize,
    pub ffmpeg: Option<PathBuf>,
    pub connect_timeout: Duration,
    /// longest silence tolerated between two reads; the whole transfer is unbounded.
    pub read_timeout: Duration,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output: output.into(),
            referer: None,
            connections: 1,
            ffmpeg: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn connections(mut self, connections: usize) -> Self {
        self.connections = connections.max(1);
        self
    }

    /// uses an explicit ffmpeg binary instead of looking it up in `PATH`.
    pub fn ffmpeg(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg = Some(path.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn is_hls(&self) -> bool {
        let path = self.url.split(['?', '#']).next().unwrap_or(&self.url);
        path.ends_with(".m3u8")
    }
}

/// `Episode {n}.mp4` inside a directory named after the series.
pub fn episode_output_path(dir: &Path, series: &str, episode: usize) -> PathBuf {
    dir.join(sanitize_component(series))
        .join(format!("Episode {episode}.mp4"))
}

fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

/// downloads `request` to disk and returns the number of bytes written.
pub async fn download<F>(request: DownloadRequest, on_event: F) -> Result<u64>
where
    F: Fn(DownloadEvent) + Send + Sync + 'static,
{
    download_with_counter(request, Arc::new(AtomicU64::new(0)), Arc::new(on_event)).await
}

/// like [`download`], accumulating received bytes into `counter` as they arrive.
pub async fn download_with_counter(
    request: DownloadRequest,
    counter: Arc<AtomicU64>,
    on_event: EventSink,
) -> Result<u64> {
    let progress = Progress {
        counter,
        started_at: Instant::now(),
        total: None,
        on_event,
    };

    if request.is_hls() {
        return remux_hls(&request, progress).await;
    }

    let client = build_client(&request)?;
    let head = request_with_referer(client.head(&request.url), &request)
        .send()
        .await
        .map_err(|source| DownloaderError::Request {
            context: "sending HEAD request".to_string(),
            source,
        })?;

    let size = head
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|len| *len > 0 && head.status().is_success());

    let accepts_ranges = head
        .headers()
        .get(header::ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("bytes"));

    let progress = Progress {
        total: size,
        ..progress
    };

    match size {
        Some(total) if accepts_ranges && request.connections > 1 && total > 0 => {
            parallel_download(&client, &request, total, progress).await
        }
        _ => single_stream_download(&client, &request, progress).await,
    }
}

struct Progress {
    counter: Arc<AtomicU64>,
    started_at: Instant,
    total: Option<u64>,
    on_event: EventSink,
}

impl Progress {
    fn started(&self) {
        (self.on_event)(DownloadEvent::Started {
            total_bytes: self.total,
        });
    }

    fn advance(&self, bytes: u64) {
        let downloaded = self.counter.fetch_add(bytes, Ordering::Relaxed) + bytes;
        (self.on_event)(DownloadEvent::Progress {
            downloaded_bytes: downloaded,
            total_bytes: self.total,
            elapsed: self.started_at.elapsed(),
        });
    }

    fn finished(&self) -> u64 {
        let downloaded = self.counter.load(Ordering::Relaxed);
        (self.on_event)(DownloadEvent::Finished {
            downloaded_bytes: downloaded,
            elapsed: self.started_at.elapsed(),
        });
        downloaded
    }
}

fn build_client(request: &DownloadRequest) -> Result<Client> {
    Client::builder()
        .connect_timeout(request.connect_timeout)
        .read_timeout(request.read_timeout)
        .build()
        .map_err(DownloaderError::BuildClient)
}

fn request_with_referer(
    builder: reqwest::RequestBuilder,
    request: &DownloadRequest,
) -> reqwest::RequestBuilder {
    match &request.referer {
        Some(referer) => builder.header(header::REFERER, referer),
        None => builder,
    }
}

async fn single_stream_download(
    client: &Client,
    request: &DownloadRequest,
    progress: Progress,
) -> Result<u64> {
    info!(url = %request.url, output = %request.output.display(), "single stream download");
    let mut response = request_with_referer(client.get(&request.url), request)
        .send()
        .await
        .map_err(|source| DownloaderError::Request {
            context: "sending GET request".to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(DownloaderError::HttpStatus {
            context: "downloading file".to_string(),
            status: response.status(),
        });
    }

    let progress = Progress {
        total: progress.total.or(response.content_length()),
        ..progress
    };
    progress.started();

    let mut file = create_output(&request.output).await?;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|source| DownloaderError::Request {
            context: "reading response body".to_string(),
            source,
        })?
    {
        file.write_all(&chunk)
            .await
            .map_err(|source| DownloaderError::Io {
                context: format!("writing output file {}", request.output.display()),
                source,
            })?;
        progress.advance(chunk.len() as u64);
    }

    flush(&mut file, &request.output).await?;
    Ok(progress.finished())
}

/// inclusive byte ranges splitting `total` bytes across at most `workers` chunks.
pub fn split_ranges(total: u64, workers: usize) -> Vec<(u64, u64)> {
    if total == 0 {
        return Vec::new();
    }

    let workers = (workers.max(1) as u64).min(total);
    let chunk_size = total.div_ceil(workers);

    (0..workers)
        .map(|idx| idx * chunk_size)
        .take_while(|start| *start < total)
        .map(|start| (start, (start + chunk_size).min(total) - 1))
        .collect()
}

async fn parallel_download(
    client: &Client,
    request: &DownloadRequest,
    total_size: u64,
    progress: Progress,
) -> Result<u64> {
    let ranges = split_ranges(total_size, request.connections);
    info!(
        url = %request.url,
        output = %request.output.display(),
        chunks = ranges.len(),
        "parallel ranged download"
    );
    progress.started();

    let progress = Arc::new(progress);
    let (tx, mut rx) = mpsc::channel::<Result<(usize, Vec<u8>)>>(ranges.len().max(1));
    // dropping the set aborts every in-flight chunk
    let mut workers = JoinSet::new();

    for (idx, (start, end)) in ranges.into_iter().enumerate() {
        let builder = request_with_referer(client.get(&request.url), request);
        let tx = tx.clone();
        let progress = Arc::clone(&progress);

        workers.spawn(async move {
            let result = fetch_chunk(builder, idx, start, end, &progress).await;
            let _ = tx.send(result).await;
        });
    }

    drop(tx);

    let mut file = create_output(&request.output).await?;

    let mut next = 0usize;
    let mut written = 0u64;
    let mut pending = BTreeMap::new();

    while let Some(msg) = rx.recv().await {
        let (idx, bytes) = msg?;
        pending.insert(idx, bytes);

        while let Some(bytes) = pending.remove(&next) {
            file.write_all(&bytes)
                .await
                .map_err(|source| DownloaderError::Io {
                    context: format!("writing output file {}", request.output.display()),
                    source,
                })?;
            written += bytes.len() as u64;
            next += 1;
        }
    }

    flush(&mut file, &request.output).await?;
    if written != total_size {
        return Err(DownloaderError::SizeMismatch {
            url: request.url.clone(),
            expected: total_size,
            actual: written,
        });
    }
    Ok(progress.finished())
}

async fn fetch_chunk(
    builder: reqwest::RequestBuilder,
    idx: usize,
    start: u64,
    end: u64,
    progress: &Progress,
) -> Result<(usize, Vec<u8>)> {
    let range = format!("bytes={start}-{end}");
    debug!(idx, %range, "fetching chunk");
    let mut response = builder
        .header(header::RANGE, range)
        .send()
        .await
        .map_err(|source| DownloaderError::Request {
            context: format!("downloading chunk {idx}"),
            source,
        })?;

    // a plain 200 means the range was ignored and the body is the whole file
    if response.status() != StatusCode::PARTIAL_CONTENT {
        return Err(DownloaderError::HttpStatus {
            context: format!("downloading chunk {idx}"),
            status: response.status(),
        });
    }

    let mut bytes = Vec::with_capacity((end - start + 1) as usize);
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|source| DownloaderError::Request {
            context: format!("reading chunk {idx}"),
            source,
        })?
    {
        bytes.extend_from_slice(&chunk);
        progress.advance(chunk.len() as u64);
    }

    Ok((idx, bytes))
}

async fn remux_hls(request: &DownloadRequest, progress: Progress) -> Result<u64> {
    let ffmpeg = match &request.ffmpeg {
        Some(path) => path.clone(),
        None => which::which("ffmpeg").map_err(|_| DownloaderError::MissingTool {
            tool: "ffmpeg",
            purpose: "downloading hls streams",
        })?,
    };

    info!(url = %request.url, output = %request.output.display(), "remuxing hls stream with ffmpeg");
    ensure_parent_dir(&request.output).await?;
    progress.started();

    let mut cmd = tokio::process::Command::new(&ffmpeg);
    cmd.arg("-y")
        .arg("-loglevel")
        .arg("error");
    if let Some(referer) = &request.referer {
        cmd.arg("-referer").arg(referer);
    }
    cmd.arg("-rw_timeout")
        .arg(request.read_timeout.as_micros().to_string());
    let status = cmd
        .arg("-i")
        .arg(&request.url)
        .arg("-c")
        .arg("copy")
        .arg(&request.output)
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|source| DownloaderError::Io {
            context: format!("spawning {}", ffmpeg.display()),
            source,
        })?;

    if !status.success() {
        return Err(DownloaderError::Ffmpeg {
            url: request.url.clone(),
            status: status.to_string(),
        });
    }

    let written = tokio::fs::metadata(&request.output)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    progress.counter.store(written, Ordering::Relaxed);
    Ok(progress.finished())
}

async fn create_output(output: &Path) -> Result<File> {
    ensure_parent_dir(output).await?;
    File::create(output)
        .await
        .map_err(|source| DownloaderError::Io {
            context: format!("creating output file {}", output.display()),
            source,
        })
}

async fn flush(file: &mut File, output: &Path) -> Result<()> {
    file.flush().await.map_err(|source| DownloaderError::Io {
        context: format!("flushing output file {}", output.display()),
        source,
    })
}

async fn ensure_parent_dir(output: &Path) -> Result<()> {
    let Some(parent) = output.parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| DownloaderError::Io {
            context: format!("creating output directory {}", parent.display()),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn ranges_cover_every_byte_once() {
        assert_eq!(split_ranges(10, 2), vec![(0, 4), (5, 9)]);
        assert_eq!(split_ranges(10, 3), vec![(0, 3), (4, 7), (8, 9)]);
        assert_eq!(split_ranges(3, 8), vec![(0, 0), (1, 1), (2, 2)]);
        assert!(split_ranges(0, 4).is_empty());
    }

    #[test]
    fn hls_detection_ignores_query() {
        assert!(DownloadRequest::new("https://cdn.example/a/index.m3u8?t=1", "x").is_hls());
        assert!(!DownloadRequest::new("https://cdn.example/a/ep.mp4", "x").is_hls());
    }

    #[test]
    fn episode_paths_live_under_series_dir() {
        assert_eq!(
            episode_output_path(Path::new("/tmp/dl"), "Naruto: Shippuden", 3),
            PathBuf::from("/tmp/dl/Naruto_ Shippuden/Episode 3.mp4")
        );
    }

    #[tokio::test]
    async fn single_stream_writes_file_and_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ep.mp4"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ep.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"0123456789".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("show").join("Episode 1.mp4");
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let written = download(
            DownloadRequest::new(format!("{}/ep.mp4", server.uri()), &output),
            move |event| sink.lock().expect("events lock").push(event),
        )
        .await
        .expect("download should succeed");

        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&output).expect("output exists"), b"0123456789");

        let events = events.lock().expect("events lock");
        assert!(matches!(events.first(), Some(DownloadEvent::Started { .. })));
        assert!(matches!(
            events.last(),
            Some(DownloadEvent::Finished {
                downloaded_bytes: 10,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn http_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let err = download(
            DownloadRequest::new(format!("{}/gone.mp4", server.uri()), dir.path().join("x.mp4")),
            |_| {},
        )
        .await
        .expect_err("404 should fail");

        assert!(matches!(err, DownloaderError::HttpStatus { status, .. } if status == StatusCode::NOT_FOUND));
    }

    async fn ranged_server(at: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path(at))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("accept-ranges", "bytes")
                    .set_body_bytes(b"0123456789".to_vec()),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn ranged_chunks_are_reassembled_in_order() {
        let server = ranged_server("/ep.mp4").await;
        for (range, body) in [("bytes=0-4", "01234"), ("bytes=5-9", "56789")] {
            Mock::given(method("GET"))
                .and(path("/ep.mp4"))
                .and(header_eq("range", range))
                .respond_with(ResponseTemplate::new(206).set_body_string(body))
                .mount(&server)
                .await;
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("ep.mp4");
        let written = download(
            DownloadRequest::new(format!("{}/ep.mp4", server.uri()), &output).connections(2),
            |_| {},
        )
        .await
        .expect("ranged download should succeed");

        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&output).expect("output exists"), b"0123456789");
    }

    #[tokio::test]
    async fn ignored_range_header_fails_the_chunk() {
        let server = ranged_server("/whole.mp4").await;
        Mock::given(method("GET"))
            .and(path("/whole.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_string("0123456789"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let err = download(
            DownloadRequest::new(format!("{}/whole.mp4", server.uri()), dir.path().join("w.mp4"))
                .connections(2),
            |_| {},
        )
        .await
        .expect_err("a 200 reply to a range request should fail");

        assert!(matches!(err, DownloaderError::HttpStatus { status, .. } if status == StatusCode::OK));
    }

    #[tokio::test]
    async fn stalled_head_request_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/stall.mp4"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let request =
            DownloadRequest::new(format!("{}/stall.mp4", server.uri()), dir.path().join("s.mp4"))
                .read_timeout(Duration::from_millis(200));

        let err = tokio::time::timeout(Duration::from_secs(5), download(request, |_| {}))
            .await
            .expect("the read timeout should fire first")
            .expect_err("a stalled server should fail the download");

        assert!(matches!(err, DownloaderError::Request { .. }));
    }
}
