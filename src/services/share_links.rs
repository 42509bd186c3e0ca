use serde_json::Value;
use validator::Validate;

use super::{PromptService, ServiceError, ServiceResult};
use crate::{
    models::{CreateShareLink, Prompt, ShareLink, generate_share_token, new_id, now_millis},
    store::Collection,
    sync::SyncCoordinator,
};

/// Service layer for prompt share links
#[derive(Clone)]
pub struct ShareLinkService {
    sync: SyncCoordinator,
    prompts: PromptService,
}

impl ShareLinkService {
    pub fn new(sync: SyncCoordinator, prompts: PromptService) -> Self {
        Self { sync, prompts }
    }

    /// Issue a new link for an existing prompt.
    pub async fn create(&self, input: CreateShareLink) -> ServiceResult<ShareLink> {
        input.validate()?;
        self.prompts.require(&input.prompt_id).await?;

        let now = now_millis();
        let link = ShareLink {
            id: new_id(),
            prompt_id: input.prompt_id,
            kind: input.kind,
            token: generate_share_token(),
            expires_at: input
                .expires_in_secs
                .map(|secs| now.saturating_add(secs.saturating_mul(1000))),
            created_at: now,
            access_count: 0,
        };
        self.sync.save(&link).await?;
        tracing::debug!(link_id = %link.id, prompt_id = %link.prompt_id, "Created share link");
        Ok(link)
    }

    /// Look up a token, count the access and return the shared prompt.
    pub async fn resolve(&self, token: &str) -> ServiceResult<(ShareLink, Prompt)> {
        let mut link: ShareLink = self
            .sync
            .find_by_index("token", &Value::String(token.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::not_found(Collection::ShareLinks, token))?;

        if link.is_expired_at(now_millis()) {
            return Err(ServiceError::Expired);
        }

        let prompt = self.prompts.require(&link.prompt_id).await?;
        link.access_count += 1;
        self.sync.save(&link).await?;
        Ok((link, prompt))
    }

    pub async fn list_for_prompt(&self, prompt_id: &str) -> ServiceResult<Vec<ShareLink>> {
        let mut links: Vec<ShareLink> = self
            .sync
            .find_by_index("promptId", &Value::String(prompt_id.to_string()))
            .await?;
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    pub async fn revoke(&self, id: &str) -> ServiceResult<()> {
        Ok(self.sync.delete::<ShareLink>(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{CreatePrompt, ShareLinkKind},
        services::test_coordinator,
    };

    async fn setup() -> (ShareLinkService, SyncCoordinator, String) {
        let sync = test_coordinator().await;
        let prompts = PromptService::new(sync.clone());
        let prompt = prompts
            .create(CreatePrompt {
                title: Some("Shared".into()),
                ..Default::default()
            })
            .await
            .expect("create prompt");
        (ShareLinkService::new(sync.clone(), prompts), sync, prompt.id)
    }

    #[tokio::test]
    async fn test_resolve_counts_access() {
        let (links, _, prompt_id) = setup().await;
        let link = links
            .create(CreateShareLink {
                prompt_id: prompt_id.clone(),
                kind: ShareLinkKind::Forkable,
                expires_in_secs: None,
            })
            .await
            .expect("create");

        let (first, prompt) = links.resolve(&link.token).await.expect("resolve");
        assert_eq!(prompt.id, prompt_id);
        assert_eq!(first.access_count, 1);
        let (second, _) = links.resolve(&link.token).await.expect("resolve");
        assert_eq!(second.access_count, 2);

        assert_eq!(links.list_for_prompt(&prompt_id).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_link_requires_prompt() {
        let (links, _, _) = setup().await;
        let result = links
            .create(CreateShareLink {
                prompt_id: "ghost".into(),
                kind: ShareLinkKind::Readonly,
                expires_in_secs: None,
            })
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_expired_and_revoked_links() {
        let (links, sync, prompt_id) = setup().await;
        let mut link = links
            .create(CreateShareLink {
                prompt_id,
                kind: ShareLinkKind::Readonly,
                expires_in_secs: Some(60),
            })
            .await
            .expect("create");

        link.expires_at = Some(now_millis() - 1);
        sync.save(&link).await.expect("save");
        assert!(matches!(links.resolve(&link.token).await, Err(ServiceError::Expired)));

        links.revoke(&link.id).await.expect("revoke");
        assert!(matches!(
            links.resolve(&link.token).await,
            Err(ServiceError::NotFound { .. })
        ));
    }
}
