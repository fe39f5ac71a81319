//! Playlist export and sharing.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use saturn::Playlist;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const M3U_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub share_id: String,
    pub url: String,
}

fn validated(body: Result<Json<Playlist>, JsonRejection>) -> ApiResult<Playlist> {
    let Json(playlist) = body?;
    if playlist.name.trim().is_empty() {
        return Err(ApiError::Validation("missing field name".to_string()));
    }
    Ok(playlist)
}

/// POST /save_playlist
pub async fn save_playlist(
    body: Result<Json<Playlist>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let playlist = validated(body)?;
    let disposition = format!("attachment; filename=\"{}\"", playlist.file_name());

    Ok((
        [
            (header::CONTENT_TYPE, M3U_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        playlist.to_m3u(),
    ))
}

/// POST /share_playlist
pub async fn share_playlist(
    State(state): State<AppState>,
    body: Result<Json<Playlist>, JsonRejection>,
) -> ApiResult<Json<ShareResponse>> {
    let playlist = validated(body)?;
    let share_id = state.store.save(playlist)?;
    tracing::info!(%share_id, "playlist shared");

    Ok(Json(ShareResponse {
        url: format!("/download_shared_playlist/{share_id}"),
        share_id,
    }))
}

/// GET /download_shared_playlist/{id}
pub async fn download_shared_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let playlist = state
        .store
        .get(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("no shared playlist with id {id}")))?;

    Ok(([(header::CONTENT_TYPE, M3U_CONTENT_TYPE)], playlist.to_m3u()))
}
