use thiserror::Error;

use saturn_core::ExtractError;

pub type Result<T> = std::result::Result<T, SaturnError>;

/// coarse classification used by callers that map errors onto user-facing
/// statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// a fetch failed or returned a non-success status.
    Network,
    /// an expected element or pattern was missing at some stage.
    NotFound,
    /// caller input was missing or malformed.
    Validation,
}

#[derive(Debug, Error)]
pub enum SaturnError {
    #[error("failed to parse site origin {origin}")]
    InvalidOrigin { origin: String },

    #[error("{0}")]
    Extract(#[from] ExtractError),

    #[error("no streaming link found in episode page {url}")]
    NoStreamingLink { url: String },

    #[error("no episodes found in anime page {url}")]
    NoEpisodes { url: String },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0}")]
    Message(String),
}

impl SaturnError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Extract(ExtractError::InvalidUrl { .. }) => ErrorKind::Validation,
            Self::Extract(ExtractError::HttpStatus { status, .. })
                if *status == reqwest::StatusCode::NOT_FOUND =>
            {
                ErrorKind::NotFound
            }
            Self::Extract(_) | Self::Message(_) => ErrorKind::Network,
            Self::NoStreamingLink { .. } | Self::NoEpisodes { .. } => ErrorKind::NotFound,
            Self::InvalidOrigin { .. } | Self::Validation(_) => ErrorKind::Validation,
        }
    }
}
