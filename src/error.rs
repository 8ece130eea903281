use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::preferences::PrefError;

pub const URL_REQUIRED: &str = "URL is required";
pub const INVALID_PLAYLIST_URL: &str = "Invalid YouTube playlist URL";
pub const FETCH_FAILED: &str = "Failed to fetch playlist information";

/// Every way a playlist-info request can fail. The caller only ever sees `status()` and the
/// fixed `message()`; causes are kept for the logs.
#[derive(Error, Debug)]
pub enum PlaylistInfoError {
    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("Failed to fetch playlist information (upstream status {status})")]
    Upstream { status: StatusCode },

    #[error("Failed to fetch playlist information: {0}")]
    Internal(#[from] InternalCause),
}

#[derive(Error, Debug)]
pub enum InternalCause {
    #[error("request to backend failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("could not read form submission: {0}")]
    Form(String),

    #[error("backend responded with {0}")]
    UpstreamStatus(StatusCode),
}

impl PlaylistInfoError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status } => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidInput(msg) => *msg,
            Self::Upstream { .. } | Self::Internal(_) => FETCH_FAILED,
        }
    }
}

impl IntoResponse for PlaylistInfoError {
    fn into_response(self) -> Response {
        (self.status(), self.message()).into_response()
    }
}

/// Failures that stop the server before it accepts a connection
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] PrefError),

    #[error("invalid listen address {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("could not set up logging: {0}")]
    Logging(String),
}
