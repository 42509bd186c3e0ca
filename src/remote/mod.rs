//! Remote replica: an optional document database mirroring the local store.
//!
//! The replica is configured once at startup from `[remote]`. Missing or
//! placeholder credentials leave it [`RemoteReplica::Disabled`]; that is a
//! normal operating mode, not an error.
//!
//! Backends:
//!
//! - **Firestore** over its REST API, used when credentials are configured.
//! - **Memory**, an in-process replica for tests and demos.

mod error;
mod firestore;
mod memory;
mod traits;

use std::sync::Arc;

pub use error::*;
pub use firestore::FirestoreRemote;
pub use memory::MemoryRemote;
use serde_json::Value;
pub use traits::*;

use crate::{config::RemoteConfig, store::Collection};

/// The remote half of the dual store, present or not.
#[derive(Clone, Default)]
pub enum RemoteReplica {
    #[default]
    Disabled,
    Connected(Arc<dyn RemoteStore>),
}

impl std::fmt::Debug for RemoteReplica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteReplica::Disabled => f.write_str("RemoteReplica::Disabled"),
            RemoteReplica::Connected(_) => f.write_str("RemoteReplica::Connected"),
        }
    }
}

impl RemoteReplica {
    /// Builds the replica described by `config`. Never fails: anything short
    /// of usable credentials yields `Disabled`.
    pub fn configure(config: &RemoteConfig) -> Self {
        let Some(credentials) = config.credentials() else {
            tracing::info!("Remote replica not configured; running local-only");
            return RemoteReplica::Disabled;
        };

        let project_id = credentials.project_id.clone();
        match FirestoreRemote::new(config, credentials) {
            Ok(remote) => {
                tracing::info!(project_id = %project_id, "Remote replica enabled");
                RemoteReplica::Connected(Arc::new(remote))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote replica could not be set up; running local-only");
                RemoteReplica::Disabled
            }
        }
    }

    pub fn connected(store: Arc<dyn RemoteStore>) -> Self {
        RemoteReplica::Connected(store)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, RemoteReplica::Connected(_))
    }

    fn store(&self) -> RemoteResult<&Arc<dyn RemoteStore>> {
        match self {
            RemoteReplica::Connected(store) => Ok(store),
            RemoteReplica::Disabled => Err(RemoteError::Disabled),
        }
    }

    pub async fn upsert(&self, collection: Collection, id: &str, record: &Value) -> RemoteResult<()> {
        self.store()?.upsert(collection, id, record).await
    }

    pub async fn get(&self, collection: Collection, id: &str) -> RemoteResult<Option<Value>> {
        self.store()?.get(collection, id).await
    }

    pub async fn list(&self, collection: Collection, order: &OrderBy) -> RemoteResult<Vec<Value>> {
        self.store()?.list(collection, order).await
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()> {
        self.store()?.delete(collection, id).await
    }

    pub async fn subscribe(
        &self,
        collection: Collection,
        order: &OrderBy,
    ) -> RemoteResult<RemoteListener> {
        self.store()?.subscribe(collection, order).await
    }
}
