use std::{collections::BTreeMap, sync::Arc, time::Instant};

use async_trait::async_trait;
use serde_json::Value;
use validator::Validate;

use super::{PromptService, ServiceError, ServiceResult};
use crate::{
    models::{ExecuteRun, ModelParameters, RateRun, Run, new_id, now_millis},
    store::Collection,
    sync::SyncCoordinator,
    transfer::fill_placeholders,
};

/// Something that turns a filled prompt into model output.
#[async_trait]
pub trait ModelRunner: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        parameters: &ModelParameters,
    ) -> ServiceResult<String>;
}

/// Canned responses; no model is contacted.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockModel;

#[async_trait]
impl ModelRunner for MockModel {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        _parameters: &ModelParameters,
    ) -> ServiceResult<String> {
        let preview: String = prompt.chars().take(100).collect();
        Ok(format!(
            "[Mock response] Model: {model}\n\nInput: {preview}...\n\nThis is a simulated response. Connect a real model runner to get actual output."
        ))
    }
}

/// Service layer for prompt runs
#[derive(Clone)]
pub struct RunService {
    sync: SyncCoordinator,
    prompts: PromptService,
    runner: Arc<dyn ModelRunner>,
}

impl RunService {
    pub fn new(sync: SyncCoordinator, prompts: PromptService, runner: Arc<dyn ModelRunner>) -> Self {
        Self {
            sync,
            prompts,
            runner,
        }
    }

    /// Fill the prompt's placeholders from `input`, call the model and record
    /// the run. Missing inputs become empty strings.
    pub async fn execute(&self, request: ExecuteRun) -> ServiceResult<Run> {
        request.validate()?;
        let prompt = self.prompts.require(&request.prompt_id).await?;

        let filled = fill_placeholders(&prompt.content, |name| {
            request.input.get(name).map(input_text).unwrap_or_default()
        });

        let started = Instant::now();
        let output = self
            .runner
            .complete(&filled, &request.model, &request.parameters)
            .await?;
        let latency = started.elapsed().as_millis() as u64;

        let run = Run {
            id: new_id(),
            prompt_id: request.prompt_id,
            input: request.input,
            output,
            model: request.model,
            parameters: request.parameters,
            latency,
            cost: None,
            rating: None,
            tags: request.tags,
            notes: None,
            created_at: now_millis(),
            ab_test_group: request.ab_test_group,
        };
        self.sync.save(&run).await?;

        tracing::info!(
            run_id = %run.id,
            prompt_id = %run.prompt_id,
            model = %run.model,
            latency_ms = run.latency,
            "Recorded run"
        );
        Ok(run)
    }

    /// Run the same prompt once per input, in order. Stops at the first
    /// failure.
    pub async fn batch_execute(
        &self,
        prompt_id: &str,
        inputs: Vec<BTreeMap<String, Value>>,
        model: &str,
        parameters: ModelParameters,
    ) -> ServiceResult<Vec<Run>> {
        let mut runs = Vec::with_capacity(inputs.len());
        for input in inputs {
            let run = self
                .execute(ExecuteRun {
                    prompt_id: prompt_id.to_string(),
                    input,
                    model: model.to_string(),
                    parameters: parameters.clone(),
                    tags: Vec::new(),
                    ab_test_group: None,
                })
                .await?;
            runs.push(run);
        }
        Ok(runs)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Option<Run>> {
        Ok(self.sync.get(id).await?)
    }

    /// All runs, newest first.
    pub async fn list(&self) -> ServiceResult<Vec<Run>> {
        let mut runs: Vec<Run> = self.sync.list().await?;
        sort_newest_first(&mut runs);
        Ok(runs)
    }

    /// Runs of one prompt via the `promptId` index, newest first.
    pub async fn runs_for_prompt(&self, prompt_id: &str) -> ServiceResult<Vec<Run>> {
        let mut runs: Vec<Run> = self
            .sync
            .find_by_index("promptId", &Value::String(prompt_id.to_string()))
            .await?;
        sort_newest_first(&mut runs);
        Ok(runs)
    }

    pub async fn rate(&self, id: &str, rating: RateRun) -> ServiceResult<Run> {
        rating.validate()?;
        let mut run: Run = self
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(Collection::Runs, id))?;
        run.rating = Some(rating.rating);
        run.notes = rating.notes;
        self.sync.save(&run).await?;
        Ok(run)
    }
}

fn input_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn sort_newest_first(runs: &mut [Run]) {
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::{models::CreatePrompt, services::test_coordinator};

    /// Records the prompt it was given and echoes it back.
    #[derive(Default)]
    struct EchoModel {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ModelRunner for EchoModel {
        async fn complete(
            &self,
            prompt: &str,
            _model: &str,
            _parameters: &ModelParameters,
        ) -> ServiceResult<String> {
            self.seen.lock().expect("lock").push(prompt.to_string());
            Ok(prompt.to_uppercase())
        }
    }

    async fn setup(runner: Arc<dyn ModelRunner>) -> (RunService, String) {
        let sync = test_coordinator().await;
        let prompts = PromptService::new(sync.clone());
        let prompt = prompts
            .create(CreatePrompt {
                title: Some("Greeter".into()),
                content: Some("Hello {{name}}, age {{age}}{{missing}}".into()),
                ..Default::default()
            })
            .await
            .expect("create prompt");
        (RunService::new(sync, prompts, runner), prompt.id)
    }

    fn request(prompt_id: &str, input: serde_json::Value) -> ExecuteRun {
        ExecuteRun {
            prompt_id: prompt_id.to_string(),
            input: serde_json::from_value(input).expect("input map"),
            model: "mock-1".into(),
            parameters: ModelParameters::default(),
            tags: vec![],
            ab_test_group: Some("A".into()),
        }
    }

    #[tokio::test]
    async fn test_execute_fills_placeholders_and_persists() {
        let model = Arc::new(EchoModel::default());
        let (runs, prompt_id) = setup(model.clone()).await;

        let run = runs
            .execute(request(&prompt_id, json!({"name": "Ada", "age": 36})))
            .await
            .expect("execute");

        assert_eq!(model.seen.lock().expect("lock")[0], "Hello Ada, age 36");
        assert_eq!(run.output, "HELLO ADA, AGE 36");
        assert_eq!(run.ab_test_group.as_deref(), Some("A"));

        let stored = runs.get(&run.id).await.expect("get").expect("stored");
        assert_eq!(stored, run);
    }

    #[tokio::test]
    async fn test_execute_unknown_prompt() {
        let (runs, _) = setup(Arc::new(MockModel)).await;
        let result = runs.execute(request("ghost", json!({}))).await;
        assert!(matches!(
            result,
            Err(ServiceError::NotFound {
                collection: Collection::Prompts,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_mock_model_output() {
        let (runs, prompt_id) = setup(Arc::new(MockModel)).await;
        let run = runs
            .execute(request(&prompt_id, json!({"name": "Ada"})))
            .await
            .expect("execute");
        assert!(run.output.starts_with("[Mock response] Model: mock-1"));
        assert!(run.output.contains("Hello Ada, age "));
    }

    #[tokio::test]
    async fn test_batch_and_lookup_by_prompt() {
        let (runs, prompt_id) = setup(Arc::new(MockModel)).await;
        let batch = runs
            .batch_execute(
                &prompt_id,
                vec![
                    serde_json::from_value(json!({"name": "A"})).expect("input"),
                    serde_json::from_value(json!({"name": "B"})).expect("input"),
                ],
                "mock-1",
                ModelParameters::default(),
            )
            .await
            .expect("batch");
        assert_eq!(batch.len(), 2);

        let for_prompt = runs.runs_for_prompt(&prompt_id).await.expect("lookup");
        assert_eq!(for_prompt.len(), 2);
        assert!(runs.runs_for_prompt("other").await.expect("lookup").is_empty());
        assert_eq!(runs.list().await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn test_rate() {
        let (runs, prompt_id) = setup(Arc::new(MockModel)).await;
        let run = runs
            .execute(request(&prompt_id, json!({})))
            .await
            .expect("execute");

        let rated = runs
            .rate(
                &run.id,
                RateRun {
                    rating: 4,
                    notes: Some("solid".into()),
                },
            )
            .await
            .expect("rate");
        assert_eq!(rated.rating, Some(4));
        assert_eq!(rated.notes.as_deref(), Some("solid"));

        let invalid = runs.rate(&run.id, RateRun { rating: 9, notes: None }).await;
        assert!(matches!(invalid, Err(ServiceError::Validation(_))));
        let missing = runs.rate("ghost", RateRun { rating: 3, notes: None }).await;
        assert!(matches!(missing, Err(ServiceError::NotFound { .. })));
    }
}
