use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use saturn::prelude::*;
use saturn_downloader::{DEFAULT_MAX_CONCURRENT, DEFAULT_RETAINED_FINISHED, DownloadPool};

use crate::state::AppState;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about)]
pub struct ServerArgs {
    /// Address the service listens on
    #[arg(long, env = "SATURN_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// AnimeSaturn origin every relative link resolves against
    #[arg(long, env = "SATURN_ORIGIN", default_value = DEFAULT_ORIGIN)]
    pub origin: String,

    /// Timeout for each upstream request, in seconds
    #[arg(long, env = "SATURN_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,

    /// Retries for transient upstream failures
    #[arg(long, env = "SATURN_RETRIES", default_value_t = 2)]
    pub retries: u32,

    /// Directory downloads are written into
    #[arg(long, env = "SATURN_DOWNLOAD_DIR", default_value = "downloads")]
    pub download_dir: PathBuf,

    /// Downloads running at the same time
    #[arg(long, env = "SATURN_JOBS", default_value_t = DEFAULT_MAX_CONCURRENT)]
    pub jobs: usize,

    /// Finished downloads kept for status polling before the oldest are dropped
    #[arg(long, env = "SATURN_KEEP_FINISHED", default_value_t = DEFAULT_RETAINED_FINISHED)]
    pub keep_finished: usize,
}

impl ServerArgs {
    /// builds the shared handler state from the parsed configuration.
    pub fn state(&self) -> Result<AppState> {
        let client = SaturnBuilder::new()
            .origin(&self.origin)
            .timeout(Duration::from_secs(self.timeout))
            .retries(self.retries)
            .build()?;

        Ok(AppState {
            client,
            store: Arc::new(MemoryPlaylistStore::new()),
            pool: Arc::new(DownloadPool::new(self.jobs).retain_finished(self.keep_finished)),
            download_dir: self.download_dir.clone(),
            download_timeout: Duration::from_secs(self.timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_locally() {
        let args = ServerArgs::try_parse_from(["saturn-server"]).expect("parse");
        assert_eq!(args.bind.to_string(), "127.0.0.1:5000");
        assert_eq!(args.jobs, DEFAULT_MAX_CONCURRENT);
        assert_eq!(args.keep_finished, DEFAULT_RETAINED_FINISHED);

        let state = args.state().expect("state");
        assert_eq!(state.pool.max_concurrent(), DEFAULT_MAX_CONCURRENT);
        assert_eq!(state.download_timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_bad_bind_address() {
        assert!(ServerArgs::try_parse_from(["saturn-server", "--bind", "nowhere"]).is_err());
    }
}
