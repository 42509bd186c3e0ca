use serde_json::Value;

use super::{TransferError, TransferResult, normalize_prompt};
use crate::models::Prompt;

/// Pretty-printed JSON array. No prompts yields `[]`.
pub fn export_json(prompts: &[Prompt]) -> TransferResult<String> {
    if prompts.is_empty() {
        return Ok("[]".to_string());
    }
    Ok(serde_json::to_string_pretty(prompts)?)
}

/// Accepts either an array of prompt objects or a single object.
pub fn import_json(text: &str) -> TransferResult<Vec<Prompt>> {
    let data: Value = serde_json::from_str(text)
        .map_err(|e| TransferError::Parse(format!("Invalid JSON format: {}", e)))?;

    let items = match data {
        Value::Array(items) => items,
        single => vec![single],
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_object()
                .map(normalize_prompt)
                .ok_or_else(|| TransferError::Parse(format!("Entry {} is not an object", index)))
        })
        .collect()
}
