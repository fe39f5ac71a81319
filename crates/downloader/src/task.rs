use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{DownloadRequest, DownloaderError, EventSink, download_with_counter};

/// lifecycle of a [`DownloadTask`]: `Pending → Running → Succeeded | Failed`,
/// with `Cancelled` reachable from both non-terminal states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed(String),
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Cancelled)
    }
}

/// point-in-time view of a task, cheap to serialize for status polling.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub url: String,
    pub output: PathBuf,
    #[serde(flatten)]
    pub state: TaskState,
    pub downloaded_bytes: u64,
}

/// a download running on the tokio runtime with observable state and an
/// explicit cancellation handle.
#[derive(Debug)]
pub struct DownloadTask {
    id: String,
    url: String,
    output: PathBuf,
    state: watch::Receiver<TaskState>,
    downloaded: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl DownloadTask {
    /// spawns `request`; when `permits` is given the task stays `Pending`
    /// until it acquires one.
    pub fn spawn(
        request: DownloadRequest,
        permits: Option<Arc<Semaphore>>,
        on_event: EventSink,
    ) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let (tx, rx) = watch::channel(TaskState::Pending);
        let downloaded = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        let task = Self {
            id: id.clone(),
            url: request.url.clone(),
            output: request.output.clone(),
            state: rx,
            downloaded: Arc::clone(&downloaded),
            cancel: cancel.clone(),
        };

        tokio::spawn(async move {
            let _permit: Option<OwnedSemaphorePermit> = match permits {
                Some(permits) => tokio::select! {
                    permit = permits.acquire_owned() => permit.ok(),
                    _ = cancel.cancelled() => {
                        info!(task = %id, "download cancelled before start");
                        tx.send_replace(TaskState::Cancelled);
                        return;
                    }
                },
                None => None,
            };

            info!(task = %id, url = %request.url, "download started");
            tx.send_replace(TaskState::Running);

            let output = request.output.clone();
            let outcome = tokio::select! {
                result = download_with_counter(request, downloaded, on_event) => result,
                _ = cancel.cancelled() => Err(DownloaderError::Cancelled),
            };

            let state = match outcome {
                Ok(bytes) => {
                    info!(task = %id, bytes, "download finished");
                    TaskState::Succeeded
                }
                Err(DownloaderError::Cancelled) => {
                    info!(task = %id, "download cancelled");
                    let _ = tokio::fs::remove_file(&output).await;
                    TaskState::Cancelled
                }
                Err(err) => {
                    warn!(task = %id, error = %err, "download failed");
                    let _ = tokio::fs::remove_file(&output).await;
                    TaskState::Failed(err.to_string())
                }
            };
            tx.send_replace(state);
        });

        task
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    /// requests cancellation; a no-op once the task reached a terminal state.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// waits until the task reaches a terminal state and returns it.
    pub async fn wait(&self) -> TaskState {
        let mut rx = self.state.clone();
        match rx.wait_for(TaskState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => TaskState::Failed("download task exited unexpectedly".to_string()),
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id.clone(),
            url: self.url.clone(),
            output: self.output.clone(),
            state: self.state(),
            downloaded_bytes: self.downloaded_bytes(),
        }
    }
}
