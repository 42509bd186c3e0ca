use validator::Validate;

use super::{ServiceError, ServiceResult};
use crate::{
    models::{CreatePrompt, DEFAULT_PROMPT_TITLE, Prompt, SearchFilters, UpdatePrompt},
    store::Collection,
    sync::{Subscription, SyncCoordinator, decode_all},
    transfer::parse_prompt_text,
};

/// Service layer for prompt operations
#[derive(Clone)]
pub struct PromptService {
    sync: SyncCoordinator,
}

impl PromptService {
    pub fn new(sync: SyncCoordinator) -> Self {
        Self { sync }
    }

    /// Create a new prompt. A missing or blank title becomes
    /// [`DEFAULT_PROMPT_TITLE`].
    pub async fn create(&self, mut input: CreatePrompt) -> ServiceResult<Prompt> {
        input.validate()?;
        if input.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
            input.title = Some(DEFAULT_PROMPT_TITLE.to_string());
        }
        let prompt: Prompt = self.sync.create(&input).await?;
        tracing::debug!(prompt_id = %prompt.id, "Created prompt");
        Ok(prompt)
    }

    /// Create a prompt from pasted text, recovering its title and description.
    pub async fn create_from_text(&self, text: &str) -> ServiceResult<Prompt> {
        let parsed = parse_prompt_text(text);
        self.create(CreatePrompt {
            title: Some(parsed.title),
            description: parsed.description,
            content: Some(parsed.content),
            tags: Vec::new(),
        })
        .await
    }

    /// Store already-complete prompts, e.g. from an import. Existing prompts
    /// with the same id are replaced.
    pub async fn import(&self, prompts: &[Prompt]) -> ServiceResult<usize> {
        for prompt in prompts {
            self.sync.save(prompt).await?;
        }
        tracing::info!(count = prompts.len(), "Imported prompts");
        Ok(prompts.len())
    }

    /// Keep the prompt's id and creation time; everything else given is
    /// replaced.
    pub async fn update(&self, id: &str, input: UpdatePrompt) -> ServiceResult<Prompt> {
        input.validate()?;
        Ok(self.sync.update(id, &input).await?)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Option<Prompt>> {
        Ok(self.sync.get(id).await?)
    }

    /// Get a prompt or fail with `NotFound`.
    pub async fn require(&self, id: &str) -> ServiceResult<Prompt> {
        self.get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(Collection::Prompts, id))
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        Ok(self.sync.delete::<Prompt>(id).await?)
    }

    /// All prompts from both stores, newest first.
    pub async fn list(&self) -> ServiceResult<Vec<Prompt>> {
        let mut prompts: Vec<Prompt> = self.sync.list().await?;
        sort_newest_first(&mut prompts);
        Ok(prompts)
    }

    /// Case-insensitive substring match over title and content. Reads the
    /// local store only.
    pub async fn search(&self, query: &str) -> ServiceResult<Vec<Prompt>> {
        let mut prompts: Vec<Prompt> = self.sync.list_local().await?;
        prompts.retain(|p| p.matches_query(query));
        sort_newest_first(&mut prompts);
        Ok(prompts)
    }

    /// Title substring, creation window and required tags, all optional.
    /// Reads the local store only.
    pub async fn advanced_search(&self, filters: &SearchFilters) -> ServiceResult<Vec<Prompt>> {
        let mut prompts: Vec<Prompt> = self.sync.list_local().await?;
        prompts.retain(|p| matches_filters(p, filters));
        sort_newest_first(&mut prompts);
        Ok(prompts)
    }

    /// Live prompt list, newest first.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Vec<Prompt>) + Send + Sync + 'static,
    {
        self.sync.subscribe(Collection::Prompts, move |records| {
            let mut prompts: Vec<Prompt> = decode_all(Collection::Prompts, records);
            sort_newest_first(&mut prompts);
            callback(prompts);
        })
    }
}

fn matches_filters(prompt: &Prompt, filters: &SearchFilters) -> bool {
    if let Some(title) = filters.title.as_deref().filter(|t| !t.is_empty())
        && !prompt.title.to_lowercase().contains(&title.to_lowercase())
    {
        return false;
    }
    if let Some(range) = &filters.date_range
        && !range.contains(prompt.created_at)
    {
        return false;
    }
    filters.tags.iter().all(|tag| prompt.tags.contains(tag))
}

fn sort_newest_first(prompts: &mut [Prompt]) {
    prompts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}
