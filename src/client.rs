use std::fmt::Display;
use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use saturn_core::parser::{find_streaming_link, parse_episodes, parse_search_results};
use saturn_core::{Episode, FetchConfig, HttpFetcher, MatchSource, SearchResult, VideoExtractor};

use crate::errors::{Result, SaturnError};

/// outcome of running the video url extractor on one watch page.
///
/// `video_url` is absent both when nothing matched and when a fetch failed;
/// `error` tells the two apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_in: Option<MatchSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn failed(err: impl Display) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Self::default()
        }
    }
}

/// the full episode page → watch page → media chain for one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEpisode {
    pub episode_url: String,
    pub streaming_url: Option<String>,
    #[serde(flatten)]
    pub extraction: ExtractionResult,
}

impl ResolvedEpisode {
    pub fn video_url(&self) -> Option<&str> {
        self.extraction.video_url.as_deref()
    }

    /// the best url to hand to a player: the media url, else the watch page.
    pub fn playable_url(&self) -> Option<&str> {
        self.video_url().or(self.streaming_url.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct SaturnClient {
    origin: Url,
    fetcher: Arc<HttpFetcher>,
    extractor: VideoExtractor,
}

impl SaturnClient {
    /// creates a client for `origin` with the given fetch policy.
    pub fn new(origin: &str, fetch: FetchConfig) -> Result<Self> {
        let origin = Url::parse(&format!("{}/", origin.trim_end_matches('/'))).map_err(|_| {
            SaturnError::InvalidOrigin {
                origin: origin.to_string(),
            }
        })?;
        let fetcher = Arc::new(HttpFetcher::new(fetch)?);

        Ok(Self {
            origin,
            extractor: VideoExtractor::new(Arc::clone(&fetcher)),
            fetcher,
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub(crate) fn search_url(&self, query: &str) -> Result<Url> {
        let mut url = self
            .origin
            .join("animelist")
            .map_err(|_| SaturnError::InvalidOrigin {
                origin: self.origin.to_string(),
            })?;
        url.query_pairs_mut().append_pair("search", query);
        Ok(url)
    }

    /// searches the anime list for `query`.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SaturnError::Validation("search query is empty".to_string()));
        }

        let url = self.search_url(query)?;
        info!(%query, "searching anime list");
        let html = self
            .fetcher
            .get_text(url.as_str(), &format!("searching for {query}"))
            .await?;

        let results = parse_search_results(&html, &self.origin);
        info!(%query, count = results.len(), "search finished");
        Ok(results)
    }

    /// lists the episodes of an anime page in page order.
    pub async fn episodes(&self, anime_url: &str) -> Result<Vec<Episode>> {
        let html = self
            .fetcher
            .get_text(anime_url, &format!("loading anime page {anime_url}"))
            .await?;

        let episodes = parse_episodes(&html, &self.origin);
        info!(%anime_url, count = episodes.len(), "parsed episode list");
        Ok(episodes)
    }

    /// finds the `watch?file=` player page linked from an episode page.
    pub async fn streaming_url(&self, episode_url: &str) -> Result<Option<String>> {
        let html = self
            .fetcher
            .get_text(episode_url, &format!("loading episode page {episode_url}"))
            .await?;

        Ok(find_streaming_link(&html, &self.origin))
    }

    /// runs the extractor and collapses failures into an absent result.
    ///
    /// errors are logged and kept in [`ExtractionResult::error`]; they never
    /// reach the caller as `Err`.
    pub async fn extract_video_url(&self, watch_url: &str) -> ExtractionResult {
        match self.extractor.extract(watch_url).await {
            Ok(Some(found)) => ExtractionResult {
                video_url: Some(found.url),
                found_in: Some(found.source),
                error: None,
            },
            Ok(None) => ExtractionResult::absent(),
            Err(err) => {
                warn!(%watch_url, error = %err, "video url extraction failed");
                ExtractionResult::failed(err)
            }
        }
    }

    /// resolves an episode page all the way to its media url.
    ///
    /// fails only when the episode page itself cannot be loaded or carries no
    /// streaming link; extraction problems end up in the returned result.
    pub async fn resolve_episode(&self, episode_url: &str) -> Result<ResolvedEpisode> {
        let streaming_url =
            self.streaming_url(episode_url)
                .await?
                .ok_or_else(|| SaturnError::NoStreamingLink {
                    url: episode_url.to_string(),
                })?;

        let extraction = self.extract_video_url(&streaming_url).await;

        Ok(ResolvedEpisode {
            episode_url: episode_url.to_string(),
            streaming_url: Some(streaming_url),
            extraction,
        })
    }
}
