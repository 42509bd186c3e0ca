use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use super::{Entity, now_millis};
use crate::store::Collection;

/// Sampling parameters passed to the model. Unknown keys are preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One execution of a prompt against a model.
///
/// `prompt_id` is not enforced: deleting the prompt leaves its runs in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    pub prompt_id: String,
    #[serde(default)]
    pub input: BTreeMap<String, Value>,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub parameters: ModelParameters,
    /// Wall-clock milliseconds spent in the model call
    #[serde(default)]
    pub latency: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "now_millis")]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ab_test_group: Option<String>,
}

impl Entity for Run {
    const COLLECTION: Collection = Collection::Runs;
}

/// Request to execute a prompt
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRun {
    #[validate(length(min = 1))]
    pub prompt_id: String,
    /// Values for `{{name}}` placeholders
    #[serde(default)]
    pub input: BTreeMap<String, Value>,
    #[validate(length(min = 1, max = 128))]
    pub model: String,
    #[serde(default)]
    pub parameters: ModelParameters,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ab_test_group: Option<String>,
}

/// Request to rate a run
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateRun {
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parameters_keep_unknown_keys() {
        let params: ModelParameters = serde_json::from_value(json!({
            "temperature": 0.2,
            "maxTokens": 256,
            "seed": 42,
        }))
        .expect("deserialize");
        assert_eq!(params.max_tokens, Some(256));
        assert_eq!(params.extra.get("seed"), Some(&json!(42)));

        let round_trip = serde_json::to_value(&params).expect("serialize");
        assert_eq!(round_trip["seed"], 42);
        assert!(round_trip.get("topP").is_none());
    }

    #[test]
    fn test_rating_range() {
        assert!(RateRun { rating: 5, notes: None }.validate().is_ok());
        assert!(RateRun { rating: 0, notes: None }.validate().is_err());
        assert!(RateRun { rating: 6, notes: None }.validate().is_err());
    }
}
