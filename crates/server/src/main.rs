use clap::Parser;
use saturn_server::ServerArgs;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "saturn=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    saturn_server::serve(ServerArgs::parse()).await
}
