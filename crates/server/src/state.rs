use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use saturn::{PlaylistStore, SaturnClient};
use saturn_downloader::DownloadPool;

/// shared state handed to every route handler through axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub client: SaturnClient,
    /// shared playlists, keyed by share id.
    pub store: Arc<dyn PlaylistStore>,
    pub pool: Arc<DownloadPool>,
    pub download_dir: PathBuf,
    /// longest stall tolerated between two reads of a download.
    pub download_timeout: Duration,
}
