//! Prompt import and export.
//!
//! | Format     | Export | Import |
//! |------------|--------|--------|
//! | `json`     | yes    | yes    |
//! | `csv`      | yes    | yes    |
//! | `markdown` | yes    | no     |
//!
//! Imported records are normalized into complete [`Prompt`]s (fresh ids,
//! default title, current timestamps) but are not persisted here; callers save
//! them through the prompt service.

mod csv;
mod json;
mod markdown;
mod parse;

pub use self::csv::{export_csv, import_csv};
pub use json::{export_json, import_json};
pub use markdown::export_markdown;
pub(crate) use parse::fill_placeholders;
pub use parse::{ParsedPrompt, parse_prompt_text, placeholders};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{DEFAULT_PROMPT_TITLE, Prompt, new_id, now_millis};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Invalid input: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TransferResult<T> = Result<T, TransferError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Csv,
    Markdown,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
            Format::Markdown => "md",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            "markdown" | "md" => Ok(Format::Markdown),
            other => Err(TransferError::UnsupportedFormat(other.to_string())),
        }
    }
}

pub fn export_prompts(prompts: &[Prompt], format: Format) -> TransferResult<String> {
    match format {
        Format::Json => export_json(prompts),
        Format::Csv => export_csv(prompts),
        Format::Markdown => Ok(export_markdown(prompts)),
    }
}

pub fn import_prompts(text: &str, format: Format) -> TransferResult<Vec<Prompt>> {
    match format {
        Format::Json => import_json(text),
        Format::Csv => import_csv(text),
        Format::Markdown => Err(TransferError::UnsupportedFormat(
            "markdown cannot be imported".into(),
        )),
    }
}

/// Fills in whatever an imported record is missing.
pub(crate) fn normalize_prompt(fields: &Map<String, Value>) -> Prompt {
    let text = |name: &str| {
        fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let stamp = |name: &str| fields.get(name).and_then(Value::as_i64).filter(|t| *t > 0);

    let now = now_millis();
    let created_at = stamp("createdAt").unwrap_or(now);
    let updated_at = stamp("updatedAt").unwrap_or(now).max(created_at);

    Prompt {
        id: text("id").unwrap_or_else(new_id),
        title: text("title").unwrap_or_else(|| DEFAULT_PROMPT_TITLE.to_string()),
        content: fields
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        description: text("description"),
        tags: fields
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        created_at,
        updated_at,
    }
}

/// RFC 3339 rendering of an epoch-millisecond timestamp.
pub(crate) fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_default()
}
