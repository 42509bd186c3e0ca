use thiserror::Error;

/// Remote replica failures.
///
/// None of these ever reach domain callers: the sync coordinator logs them
/// and falls back to the local store.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote replica is disabled")]
    Disabled,

    #[error("Remote replica unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid remote document: {0}")]
    InvalidDocument(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;
