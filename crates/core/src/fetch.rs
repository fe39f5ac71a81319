use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::errors::{ExtractError, Result};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

/// timeouts and retry policy for outbound page fetches.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// upper bound for a single request, connect included.
    pub timeout: Duration,
    /// extra attempts made after a transient failure.
    pub retries: u32,
    /// delay before the first retry; doubled for every following attempt.
    pub retry_backoff: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 2,
            retry_backoff: Duration::from_millis(500),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// plain GET-and-decode fetcher shared by the parser stages and the extractor.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("it-IT,it;q=0.9,en;q=0.8"));
        if let Ok(v) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(USER_AGENT, v);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|source| ExtractError::BuildClient {
                context: "building page fetcher",
                source,
            })?;

        Ok(Self { client, config })
    }

    /// fetches `url` and returns its decoded body.
    ///
    /// transient failures (connect errors, timeouts, 429 and 5xx) are retried
    /// with exponential backoff up to `retries` times; anything else fails at once.
    pub async fn get_text(&self, url: &str, context: &str) -> Result<String> {
        let parsed = Url::parse(url).map_err(|_| ExtractError::InvalidUrl {
            url: url.to_string(),
        })?;

        let mut attempt = 0;
        loop {
            match self.get_once(parsed.clone(), context).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_transient() && attempt < self.config.retries => {
                    let delay = self.config.backoff_for(attempt);
                    warn!(%url, attempt, ?delay, error = %err, "transient fetch failure; retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn get_once(&self, url: Url, context: &str) -> Result<String> {
        debug!(%url, "fetching page");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ExtractError::Request {
                context: context.to_string(),
                source,
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());

            return Err(ExtractError::HttpStatus {
                context: context.to_string(),
                status,
                body,
            });
        }

        resp.text().await.map_err(|source| ExtractError::ResponseBody {
            context: context.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(retries: u32) -> HttpFetcher {
        HttpFetcher::new(
            FetchConfig::default()
                .retries(retries)
                .retry_backoff(Duration::from_millis(1)),
        )
        .expect("fetcher should build")
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = FetchConfig::default().retry_backoff(Duration::from_millis(100));
        assert_eq!(config.backoff_for(0), Duration::from_millis(100));
        assert_eq!(config.backoff_for(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let body = fetcher(0)
            .get_text(&format!("{}/page", server.uri()), "test page")
            .await
            .expect("fetch should succeed");
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn retries_server_errors_until_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = fetcher(2)
            .get_text(&format!("{}/flaky", server.uri()), "flaky page")
            .await
            .expect_err("fetch should fail after retries");
        assert!(matches!(err, ExtractError::HttpStatus { status, .. } if status.as_u16() == 503));
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher(3)
            .get_text(&format!("{}/missing", server.uri()), "missing page")
            .await
            .expect_err("404 should fail");
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn rejects_relative_urls() {
        let err = fetcher(0)
            .get_text("/not/absolute", "relative")
            .await
            .expect_err("relative url should fail");
        assert!(matches!(err, ExtractError::InvalidUrl { .. }));
    }
}
