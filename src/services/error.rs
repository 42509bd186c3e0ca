use thiserror::Error;

use crate::{
    store::Collection,
    sync::SyncError,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{collection} '{id}' not found")]
    NotFound { collection: Collection, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Share link has expired")]
    Expired,

    #[error("Model call failed: {0}")]
    Model(String),

    #[error(transparent)]
    Sync(SyncError),
}

impl ServiceError {
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            collection,
            id: id.into(),
        }
    }
}

impl From<SyncError> for ServiceError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NotFound { collection, id } => ServiceError::NotFound { collection, id },
            SyncError::Validation(message) => ServiceError::Validation(message),
            other => ServiceError::Sync(other),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation(errors.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
