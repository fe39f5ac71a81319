//! Error-to-HTTP response conversion.

use axum::Json;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saturn::{ErrorKind, SaturnError};
use saturn_downloader::DownloaderError;
use serde_json::json;

/// every failure a handler can return; rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Saturn(SaturnError),
    Validation(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Saturn(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Network => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Saturn(err) => err.to_string(),
            Self::Validation(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::Internal(msg) => msg.clone(),
        }
    }
}

impl From<SaturnError> for ApiError {
    fn from(err: SaturnError) -> Self {
        Self::Saturn(err)
    }
}

impl From<DownloaderError> for ApiError {
    fn from(err: DownloaderError) -> Self {
        match err {
            DownloaderError::OutputBusy { .. } => Self::Conflict(err.to_string()),
            DownloaderError::DuplicateOutput { .. } => Self::Validation(err.to_string()),
            err => Self::Internal(err.to_string()),
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "request failed");
        } else {
            tracing::debug!(status = %status, error = %message, "request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let err = ApiError::from(SaturnError::NoStreamingLink { url: "u".into() });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = ApiError::from(SaturnError::Validation("empty".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = ApiError::from(SaturnError::Message("upstream down".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn busy_download_output_is_a_conflict() {
        let err = ApiError::from(DownloaderError::OutputBusy {
            output: "Naruto/Episode 1.mp4".into(),
            task: "abc".into(),
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = ApiError::from(DownloaderError::DuplicateOutput {
            output: "Naruto/Episode 1.mp4".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_resources_produce_404() {
        let response = ApiError::NotFound("no such task".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
