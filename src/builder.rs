use std::time::Duration;

use saturn_core::FetchConfig;

use crate::prelude::*;

pub const DEFAULT_ORIGIN: &str = "https://www.animesaturn.cx";

pub struct SaturnBuilder {
    origin: String,
    fetch: FetchConfig,
}

impl Default for SaturnBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SaturnBuilder {
    /// creates a builder pointed at the default animesaturn origin.
    pub fn new() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            fetch: FetchConfig::default(),
        }
    }

    /// sets the site origin every relative link resolves against.
    pub fn origin(mut self, origin: &str) -> Self {
        self.origin = origin.trim_end_matches('/').to_string();
        self
    }

    /// per-request timeout for every outbound fetch.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.fetch = self.fetch.timeout(timeout);
        self
    }

    /// retries for transient fetch failures.
    pub fn retries(mut self, retries: u32) -> Self {
        self.fetch = self.fetch.retries(retries);
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.fetch = self.fetch.retry_backoff(backoff);
        self
    }

    /// builds a [`SaturnClient`] using the configured options.
    pub fn build(&self) -> Result<SaturnClient> {
        SaturnClient::new(&self.origin, self.fetch.clone())
    }
}
