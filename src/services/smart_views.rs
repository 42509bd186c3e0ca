use serde_json::json;

use super::{PromptService, ServiceError, ServiceResult};
use crate::{
    models::{Prompt, SearchFilters, SmartView},
    store::Collection,
    sync::SyncCoordinator,
};

/// Saved searches over prompts
#[derive(Clone)]
pub struct SmartViewService {
    sync: SyncCoordinator,
    prompts: PromptService,
}

impl SmartViewService {
    pub fn new(sync: SyncCoordinator, prompts: PromptService) -> Self {
        Self { sync, prompts }
    }

    pub async fn create(&self, name: &str, filters: SearchFilters) -> ServiceResult<SmartView> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation("Smart view name cannot be empty".into()));
        }
        Ok(self
            .sync
            .create(&json!({ "name": name, "filters": filters }))
            .await?)
    }

    /// All saved views, alphabetically.
    pub async fn list(&self) -> ServiceResult<Vec<SmartView>> {
        let mut views: Vec<SmartView> = self.sync.list().await?;
        views.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(views)
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        Ok(self.sync.delete::<SmartView>(id).await?)
    }

    /// Prompts currently matching the view's filters.
    pub async fn apply(&self, id: &str) -> ServiceResult<Vec<Prompt>> {
        let view: SmartView = self
            .sync
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(Collection::SmartViews, id))?;
        self.prompts.advanced_search(&view.filters).await
    }
}
