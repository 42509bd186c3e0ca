//! Domain services over the sync coordinator.
//!
//! Each service is a cheap `Clone` handle. They validate input, fill in
//! defaults and shape results (ordering, typed records); storage rules live in
//! [`crate::sync`].

mod error;
mod prompts;
mod runs;
mod settings;
mod share_links;
mod smart_views;
mod spaces;

use std::sync::Arc;

pub use error::*;
pub use prompts::PromptService;
pub use runs::{MockModel, ModelRunner, RunService};
pub use settings::SettingsService;
pub use share_links::ShareLinkService;
pub use smart_views::SmartViewService;
pub use spaces::{CreateSpace, SpaceService};

use crate::sync::SyncCoordinator;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub sync: SyncCoordinator,
    pub prompts: PromptService,
    pub runs: RunService,
    pub share_links: ShareLinkService,
    pub settings: SettingsService,
    pub smart_views: SmartViewService,
    pub spaces: SpaceService,
}

impl Services {
    pub fn new(sync: SyncCoordinator, runner: Arc<dyn ModelRunner>) -> Self {
        let prompts = PromptService::new(sync.clone());
        Self {
            runs: RunService::new(sync.clone(), prompts.clone(), runner),
            share_links: ShareLinkService::new(sync.clone(), prompts.clone()),
            settings: SettingsService::new(sync.clone()),
            smart_views: SmartViewService::new(sync.clone(), prompts.clone()),
            spaces: SpaceService::new(sync.clone()),
            prompts,
            sync,
        }
    }
}

/// Local-only coordinator over a fresh in-memory store.
#[cfg(test)]
pub(crate) async fn test_coordinator() -> SyncCoordinator {
    use crate::{
        config::SyncConfig,
        remote::RemoteReplica,
        store::{LocalStore, MemoryLocalStore},
    };

    let store = MemoryLocalStore::new();
    store.init().await.expect("init");
    SyncCoordinator::new(Arc::new(store), RemoteReplica::Disabled, SyncConfig::default())
}
