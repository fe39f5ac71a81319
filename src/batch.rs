use futures::future::join_all;
use tracing::{info, warn};

use crate::client::{ExtractionResult, ResolvedEpisode, SaturnClient};

impl SaturnClient {
    /// runs the extractor on every watch page concurrently.
    ///
    /// the output has one slot per input, in input order. a failed slot is
    /// absent and does not affect its siblings.
    pub async fn extract_batch<S: AsRef<str>>(&self, watch_urls: &[S]) -> Vec<ExtractionResult> {
        info!(count = watch_urls.len(), "extracting video urls concurrently");
        join_all(
            watch_urls
                .iter()
                .map(|url| self.extract_video_url(url.as_ref())),
        )
        .await
    }

    /// resolves every episode page concurrently, keeping input order.
    pub async fn resolve_batch<S: AsRef<str>>(&self, episode_urls: &[S]) -> Vec<ResolvedEpisode> {
        info!(count = episode_urls.len(), "resolving episodes concurrently");
        let results = join_all(episode_urls.iter().map(|url| async move {
            let url = url.as_ref();
            match self.resolve_episode(url).await {
                Ok(resolved) => resolved,
                Err(err) => {
                    warn!(episode_url = %url, error = %err, "episode resolution failed");
                    ResolvedEpisode {
                        episode_url: url.to_string(),
                        streaming_url: None,
                        extraction: ExtractionResult::failed(err),
                    }
                }
            }
        }))
        .await;

        let found = results.iter().filter(|r| r.video_url().is_some()).count();
        info!(found, total = results.len(), "batch resolution finished");
        results
    }
}
