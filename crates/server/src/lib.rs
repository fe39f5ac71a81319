//! HTTP front-end for saturn.
//!
//! Search, episode listing and video url resolution proxy the site through a
//! shared [`saturn::SaturnClient`]; playlists are rendered or shared through a
//! [`saturn::PlaylistStore`]; downloads run on a bounded
//! [`saturn_downloader::DownloadPool`].

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use anyhow::Context;
use axum::Router;
use axum::routing::{get, post};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::ServerArgs;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// builds the application router over `state`.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        // Scraping
        .route("/search", post(routes::scrape::search))
        .route("/episodes", post(routes::scrape::episodes))
        .route("/stream", post(routes::scrape::stream))
        .route("/batch_stream", post(routes::scrape::batch_stream))
        // Playlists
        .route("/save_playlist", post(routes::playlists::save_playlist))
        .route("/share_playlist", post(routes::playlists::share_playlist))
        .route(
            "/download_shared_playlist/{id}",
            get(routes::playlists::download_shared_playlist),
        )
        // Downloads
        .route(
            "/downloads",
            get(routes::downloads::list).post(routes::downloads::submit),
        )
        .route(
            "/downloads/{id}",
            get(routes::downloads::status).delete(routes::downloads::cancel),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// serves the router on `args.bind` until ctrl-c or SIGTERM.
pub async fn serve(args: ServerArgs) -> anyhow::Result<()> {
    let state = args.state().context("failed to build application state")?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    tracing::info!(addr = %args.bind, origin = %args.origin, "saturn server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
