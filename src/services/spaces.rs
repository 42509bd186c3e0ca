use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use super::{ServiceError, ServiceResult};
use crate::{
    models::{Space, SpaceKind, SpacePermissions},
    store::Collection,
    sync::SyncCoordinator,
};

/// Request to create a space
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpace {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: SpaceKind,
    #[serde(default)]
    pub permissions: SpacePermissions,
}

/// Named groupings of prompts
#[derive(Clone)]
pub struct SpaceService {
    sync: SyncCoordinator,
}

impl SpaceService {
    pub fn new(sync: SyncCoordinator) -> Self {
        Self { sync }
    }

    pub async fn create(&self, input: CreateSpace) -> ServiceResult<Space> {
        input.validate()?;
        Ok(self.sync.create(&input).await?)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Option<Space>> {
        Ok(self.sync.get(id).await?)
    }

    pub async fn list(&self) -> ServiceResult<Vec<Space>> {
        let mut spaces: Vec<Space> = self.sync.list().await?;
        spaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(spaces)
    }

    /// Deleting a space leaves its prompts untouched.
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        Ok(self.sync.delete::<Space>(id).await?)
    }

    /// Adding a prompt twice is a no-op.
    pub async fn add_prompt(&self, space_id: &str, prompt_id: &str) -> ServiceResult<Space> {
        let mut prompt_ids = self.require(space_id).await?.prompt_ids;
        if !prompt_ids.iter().any(|id| id == prompt_id) {
            prompt_ids.push(prompt_id.to_string());
        }
        Ok(self
            .sync
            .update(space_id, &json!({ "promptIds": prompt_ids }))
            .await?)
    }

    pub async fn remove_prompt(&self, space_id: &str, prompt_id: &str) -> ServiceResult<Space> {
        let mut prompt_ids = self.require(space_id).await?.prompt_ids;
        prompt_ids.retain(|id| id != prompt_id);
        Ok(self
            .sync
            .update(space_id, &json!({ "promptIds": prompt_ids }))
            .await?)
    }

    async fn require(&self, id: &str) -> ServiceResult<Space> {
        self.get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(Collection::Spaces, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_coordinator;

    #[tokio::test]
    async fn test_membership() {
        let sync = test_coordinator().await;
        let spaces = SpaceService::new(sync.clone());
        let space = spaces
            .create(CreateSpace {
                name: "Team".into(),
                kind: SpaceKind::Team,
                ..Default::default()
            })
            .await
            .expect("create");
        assert!(space.prompt_ids.is_empty());

        spaces.add_prompt(&space.id, "p1").await.expect("add");
        let space = spaces.add_prompt(&space.id, "p1").await.expect("add again");
        assert_eq!(space.prompt_ids, vec!["p1".to_string()]);

        let space = spaces.remove_prompt(&space.id, "p1").await.expect("remove");
        assert!(space.prompt_ids.is_empty());

        let stored = sync
            .list_records(Collection::Spaces)
            .await
            .expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["type"], "team");
    }

    #[tokio::test]
    async fn test_validation_and_missing() {
        let spaces = SpaceService::new(test_coordinator().await);
        assert!(matches!(
            spaces.create(CreateSpace::default()).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            spaces.add_prompt("ghost", "p1").await,
            Err(ServiceError::NotFound { .. })
        ));
    }
}
