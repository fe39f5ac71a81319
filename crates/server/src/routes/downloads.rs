//! Background episode downloads.

use std::collections::HashSet;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use saturn::episode_number;
use saturn_downloader::{DownloadRequest, EventSink, TaskSnapshot, episode_output_path};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_SERIES: &str = "downloads";

/// an episode to download, either a bare url or a url with its number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EpisodeRef {
    Url(String),
    Numbered { url: String, number: usize },
}

impl EpisodeRef {
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) | Self::Numbered { url, .. } => url,
        }
    }

    /// the explicit number, else the one in the url, else `fallback`.
    fn number(&self, fallback: usize) -> usize {
        match self {
            Self::Numbered { number, .. } => *number,
            Self::Url(url) => episode_number(url).unwrap_or(fallback),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadsRequest {
    pub episode_urls: Vec<EpisodeRef>,
    /// directory name the episodes are grouped under.
    pub series: Option<String>,
    /// numbering start for episodes whose number is neither given nor in the url.
    pub first_episode: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct DownloadsResponse {
    pub task_ids: Vec<String>,
    /// episodes for which no video url could be resolved.
    pub skipped: Vec<String>,
}

/// POST /downloads
///
/// resolves every episode and queues one task per resolved video url, saved as
/// `{series}/Episode {n}.mp4`. a request whose output collides with a download
/// still in progress is rejected with 409 and queues nothing.
pub async fn submit(
    State(state): State<AppState>,
    body: Result<Json<DownloadsRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<DownloadsResponse>)> {
    let Json(body) = body?;
    if body.episode_urls.is_empty() {
        return Err(ApiError::Validation("episode_urls is empty".to_string()));
    }

    let series = body
        .series
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SERIES);
    let first = body.first_episode.unwrap_or(1);

    let numbers: Vec<usize> = body
        .episode_urls
        .iter()
        .enumerate()
        .map(|(idx, episode)| episode.number(first + idx))
        .collect();
    if numbers.contains(&0) {
        return Err(ApiError::Validation("episode numbers start at 1".to_string()));
    }
    let mut seen = HashSet::new();
    if let Some(repeated) = numbers.iter().find(|n| !seen.insert(**n)) {
        return Err(ApiError::Validation(format!(
            "episode {repeated} is requested more than once"
        )));
    }

    let urls: Vec<&str> = body.episode_urls.iter().map(EpisodeRef::url).collect();
    let resolved = state.client.resolve_batch(&urls).await;

    let mut skipped = Vec::new();
    let mut requests = Vec::new();
    for (episode, number) in resolved.iter().zip(numbers) {
        let Some(url) = episode.video_url() else {
            skipped.push(episode.episode_url.clone());
            continue;
        };

        let output = episode_output_path(&state.download_dir, series, number);
        let mut request = DownloadRequest::new(url, output).read_timeout(state.download_timeout);
        if let Some(referer) = &episode.streaming_url {
            request = request.referer(referer);
        }
        let on_event: EventSink = Arc::new(|_| {});
        requests.push((request, on_event));
    }

    let tasks = state.pool.submit_all(requests)?;
    let response = DownloadsResponse {
        task_ids: tasks.iter().map(|task| task.id().to_string()).collect(),
        skipped,
    };

    tracing::info!(
        queued = response.task_ids.len(),
        skipped = response.skipped.len(),
        "downloads submitted"
    );
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /downloads
pub async fn list(State(state): State<AppState>) -> Json<Vec<TaskSnapshot>> {
    Json(state.pool.snapshots())
}

/// GET /downloads/{id}
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskSnapshot>> {
    let task = state
        .pool
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("no download task with id {id}")))?;
    Ok(Json(task.snapshot()))
}

/// DELETE /downloads/{id}
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<TaskSnapshot>)> {
    let task = state
        .pool
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("no download task with id {id}")))?;

    task.cancel();
    tracing::info!(task = %id, "download cancellation requested");
    Ok((StatusCode::ACCEPTED, Json(task.snapshot())))
}
