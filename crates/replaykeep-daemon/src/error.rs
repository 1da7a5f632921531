use replaykeep_riot::ApiError;
use replaykeep_rofl::DecodeError;
use replaykeep_store::StoreError;
use reqwest::StatusCode;
use thiserror::Error;

/// Failure to publish one replay file. Retryable by re-running sync.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("replay download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("replay host returned {status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("replay storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("replay body too small: {written} bytes (need more than {min})")]
    TooSmall { written: u64, min: u64 },

    #[error("replay URL is empty")]
    EmptyUrl,
}

/// Failure to read back and decode a stored replay.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no stored replay for match {0}")]
    NotStored(i64),

    #[error("failed to read replay: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode replay: {0}")]
    Decode(#[from] DecodeError),

    #[error("decode worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failure that aborts one account's sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to list replays: {0}")]
    ListReplays(#[source] ApiError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid account region: {0}")]
    Region(#[source] ApiError),
}

/// Failure of one match within a pass. Logged by the orchestrator and never
/// propagated past the match.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("upstream error: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
