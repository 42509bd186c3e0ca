use thiserror::Error;

use crate::store::{Collection, StoreError};

/// Errors surfaced to domain callers.
///
/// Remote failures never appear here; they are logged and absorbed by the
/// coordinator.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{collection} record '{id}' not found")]
    NotFound { collection: Collection, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        SyncError::NotFound {
            collection,
            id: id.into(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
