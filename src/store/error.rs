use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Local store not initialized")]
    NotInitialized,

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Unknown index '{index}' on collection '{collection}'")]
    UnknownIndex { collection: String, index: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage backend unavailable: {0}")]
    Unsupported(String),

    #[cfg(feature = "database-sqlite")]
    #[error("Storage error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[cfg(feature = "database-sqlite")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
