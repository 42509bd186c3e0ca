//! promptkit: an offline-first prompt knowledge base.
//!
//! Records live in a durable local store and are mirrored, best-effort, to an
//! optional remote document database. The [`sync::SyncCoordinator`] gives the
//! rest of the crate a single CRUD and subscribe surface over both; the
//! [`services`] build prompt, run, share-link and settings operations on top.

pub mod config;
pub mod models;
#[cfg(feature = "cli")]
pub mod observability;
pub mod remote;
pub mod services;
pub mod store;
pub mod sync;
pub mod transfer;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use config::PromptKitConfig;
use remote::RemoteReplica;
use services::{ModelRunner, Services};
use store::StoreResult;
use sync::SyncCoordinator;

/// Opens the configured local store, connects the remote replica if
/// credentials are present, and builds every service on top.
pub async fn open(config: &PromptKitConfig, runner: Arc<dyn ModelRunner>) -> StoreResult<Services> {
    let local = store::create_local_store(&config.storage).await?;
    let remote = RemoteReplica::configure(&config.remote);
    let sync = SyncCoordinator::new(local, remote, config.sync.clone());
    Ok(Services::new(sync, runner))
}
