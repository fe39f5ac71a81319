use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DownloaderError>;

#[derive(Debug, Error)]
pub enum DownloaderError {
    #[error("failed to build http client: {0}")]
    BuildClient(#[source] reqwest::Error),

    #[error("http request failed while {context}: {source}")]
    Request {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{context} returned HTTP {status}")]
    HttpStatus {
        context: String,
        status: reqwest::StatusCode,
    },

    #[error("io error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} not found in PATH; it is required for {purpose}")]
    MissingTool {
        tool: &'static str,
        purpose: &'static str,
    },

    #[error("ffmpeg exited with {status} while remuxing {url}")]
    Ffmpeg { url: String, status: String },

    #[error("expected {expected} bytes from {url}, received {actual}")]
    SizeMismatch {
        url: String,
        expected: u64,
        actual: u64,
    },

    #[error("{} appears more than once in the same batch", output.display())]
    DuplicateOutput { output: PathBuf },

    #[error("{} is already being written by task {task}", output.display())]
    OutputBusy { output: PathBuf, task: String },

    #[error("download cancelled")]
    Cancelled,
}
