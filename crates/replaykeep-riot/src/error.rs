use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("invalid JSON from upstream: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported region: {0}")]
    UnsupportedRegion(String),

    #[error("no API key configured")]
    MissingApiKey,

    #[error("API key is not a valid header value")]
    InvalidApiKey,
}

pub type Result<T> = std::result::Result<T, ApiError>;
