use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{ExtractError, Result};
use crate::fetch::HttpFetcher;
use crate::media::{DocumentStage, MatchSource, search_document};
use crate::parser::find_frame_src;

/// direct media url found by the extractor, with the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMatch {
    pub url: String,
    pub source: MatchSource,
}

/// walks a watch page, its first iframe, and both documents' scripts and text
/// looking for a direct `.m3u8`/`.mp4` url.
#[derive(Debug, Clone)]
pub struct VideoExtractor {
    fetcher: Arc<HttpFetcher>,
}

impl VideoExtractor {
    pub fn new(fetcher: Arc<HttpFetcher>) -> Self {
        Self { fetcher }
    }

    /// extracts the direct media url behind a watch page.
    ///
    /// search order: frame scripts, frame text, page scripts, page text.
    /// returns `Ok(None)` when every fetch succeeded but nothing matched;
    /// a failed fetch at any stage aborts the whole chain with `Err`.
    pub async fn extract(&self, watch_url: &str) -> Result<Option<MediaMatch>> {
        info!(%watch_url, "extracting video url from watch page");
        let page = self
            .fetcher
            .get_text(watch_url, &format!("loading watch page {watch_url}"))
            .await?;

        if let Some(src) = find_frame_src(&page) {
            let frame_url = resolve_frame_url(watch_url, &src)?;
            debug!(%frame_url, "found embedded frame");

            let frame = self
                .fetcher
                .get_text(&frame_url, &format!("loading embed frame {frame_url}"))
                .await?;

            if let Some(found) = Self::search(&frame, true) {
                info!(url = %found.url, source = found.source.as_str(), "video url found in frame");
                return Ok(Some(found));
            }
            debug!(%frame_url, "no media url in frame; searching watch page");
        } else {
            debug!(%watch_url, "watch page has no frame");
        }

        let found = Self::search(&page, false);
        match &found {
            Some(found) => {
                info!(url = %found.url, source = found.source.as_str(), "video url found in watch page")
            }
            None => debug!(%watch_url, "no media url anywhere in the chain"),
        }
        Ok(found)
    }

    fn search(raw: &str, in_frame: bool) -> Option<MediaMatch> {
        let (url, stage) = search_document(raw)?;
        let source = match (in_frame, stage) {
            (true, DocumentStage::Script) => MatchSource::FrameScript,
            (true, DocumentStage::RawText) => MatchSource::FrameText,
            (false, DocumentStage::Script) => MatchSource::PageScript,
            (false, DocumentStage::RawText) => MatchSource::PageText,
        };
        Some(MediaMatch { url, source })
    }
}

fn resolve_frame_url(watch_url: &str, src: &str) -> Result<String> {
    if src.is_empty() {
        return Err(ExtractError::InvalidUrl {
            url: src.to_string(),
        });
    }

    let base = Url::parse(watch_url).map_err(|_| ExtractError::InvalidUrl {
        url: watch_url.to_string(),
    })?;
    base.join(src)
        .map(String::from)
        .map_err(|_| ExtractError::InvalidUrl {
            url: src.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_urls_resolve_against_watch_page() {
        assert_eq!(
            resolve_frame_url("https://www.animesaturn.cx/watch?file=a", "/embed/1").unwrap(),
            "https://www.animesaturn.cx/embed/1"
        );
        assert_eq!(
            resolve_frame_url("https://www.animesaturn.cx/watch?file=a", "//player.example/e").unwrap(),
            "https://player.example/e"
        );
        assert_eq!(
            resolve_frame_url("https://www.animesaturn.cx/watch", "https://x.example/e").unwrap(),
            "https://x.example/e"
        );
    }

    #[test]
    fn blank_frame_src_is_rejected() {
        assert!(matches!(
            resolve_frame_url("https://www.animesaturn.cx/watch?file=a", ""),
            Err(ExtractError::InvalidUrl { url }) if url.is_empty()
        ));
    }
}
