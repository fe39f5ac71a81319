//! Search, episode listing and video url resolution.

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::State;
use axum::{Form, Json};
use saturn::{Episode, ResolvedEpisode, SearchResult};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchForm {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EpisodesForm {
    pub anime_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamForm {
    pub episode_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StreamResponse {
    pub video_url: Option<String>,
    pub streaming_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchStreamRequest {
    pub episode_urls: Vec<String>,
}

/// the value of a required form field, rejecting missing or blank input.
pub(crate) fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation(format!("missing field {field}")))
}

/// POST /search
pub async fn search(
    State(state): State<AppState>,
    form: Result<Form<SearchForm>, FormRejection>,
) -> ApiResult<Json<Vec<SearchResult>>> {
    let Form(form) = form?;
    let query = required(form.query, "query")?;
    Ok(Json(state.client.search(&query).await?))
}

/// POST /episodes
pub async fn episodes(
    State(state): State<AppState>,
    form: Result<Form<EpisodesForm>, FormRejection>,
) -> ApiResult<Json<Vec<Episode>>> {
    let Form(form) = form?;
    let anime_url = required(form.anime_url, "anime_url")?;
    Ok(Json(state.client.episodes(&anime_url).await?))
}

/// POST /stream
pub async fn stream(
    State(state): State<AppState>,
    form: Result<Form<StreamForm>, FormRejection>,
) -> ApiResult<Json<StreamResponse>> {
    let Form(form) = form?;
    let episode_url = required(form.episode_url, "episode_url")?;
    let resolved = state.client.resolve_episode(&episode_url).await?;

    Ok(Json(StreamResponse {
        video_url: resolved.extraction.video_url,
        streaming_url: resolved.streaming_url,
    }))
}

/// POST /batch_stream
pub async fn batch_stream(
    State(state): State<AppState>,
    body: Result<Json<BatchStreamRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<ResolvedEpisode>>> {
    let Json(body) = body?;
    Ok(Json(state.client.resolve_batch(&body.episode_urls).await))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(
            required(Some("  naruto ".into()), "query").unwrap(),
            "naruto"
        );
        assert!(required(Some("   ".into()), "query").is_err());
        assert!(required(None, "query").is_err());
    }
}
