use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use serde::Serialize;
use serde_json::{Map, Value};

use super::{TransferResult, format_millis, normalize_prompt};
use crate::models::Prompt;

/// Flattened row for prompt CSV export
#[derive(Serialize)]
struct PromptRow<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Description")]
    description: &'a str,
    #[serde(rename = "Content")]
    content: &'a str,
    #[serde(rename = "Tags")]
    tags: String,
    #[serde(rename = "Created At")]
    created_at: String,
    #[serde(rename = "Updated At")]
    updated_at: String,
}

const HEADERS: [&str; 7] = [
    "ID",
    "Title",
    "Description",
    "Content",
    "Tags",
    "Created At",
    "Updated At",
];

/// Every field quoted; tags joined with `;`. No prompts yields the header row
/// alone.
pub fn export_csv(prompts: &[Prompt]) -> TransferResult<String> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .has_headers(false)
        .from_writer(vec![]);

    wtr.write_record(HEADERS)?;
    for prompt in prompts {
        wtr.serialize(PromptRow {
            id: &prompt.id,
            title: &prompt.title,
            description: prompt.description.as_deref().unwrap_or_default(),
            content: &prompt.content,
            tags: prompt.tags.join(";"),
            created_at: format_millis(prompt.created_at),
            updated_at: format_millis(prompt.updated_at),
        })?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_end_matches(['\r', '\n']).to_string())
}

/// Reads prompts from CSV with a header row. Header names match
/// case-insensitively and unknown columns are ignored. Input with fewer than
/// two non-blank lines yields no prompts.
pub fn import_csv(text: &str) -> TransferResult<Vec<Prompt>> {
    if text.lines().filter(|line| !line.trim().is_empty()).count() < 2 {
        return Ok(Vec::new());
    }

    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let columns: Vec<Option<&'static str>> = rdr
        .headers()?
        .iter()
        .map(column_field)
        .collect();

    let mut prompts = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let mut fields = Map::new();
        for (value, field) in record.iter().zip(&columns) {
            let Some(field) = field else { continue };
            let value = match *field {
                "tags" => Value::Array(
                    value
                        .split(';')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(|t| Value::String(t.to_string()))
                        .collect(),
                ),
                "createdAt" | "updatedAt" => match parse_timestamp(value) {
                    Some(millis) => millis.into(),
                    None => continue,
                },
                _ => Value::String(value.to_string()),
            };
            fields.insert(field.to_string(), value);
        }
        prompts.push(normalize_prompt(&fields));
    }
    Ok(prompts)
}

fn column_field(header: &str) -> Option<&'static str> {
    let normalized: String = header
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect();
    match normalized.as_str() {
        "id" => Some("id"),
        "title" => Some("title"),
        "description" => Some("description"),
        "content" => Some("content"),
        "tags" => Some("tags"),
        "createdat" => Some("createdAt"),
        "updatedat" => Some("updatedAt"),
        _ => None,
    }
}

/// RFC 3339 or raw epoch milliseconds.
fn parse_timestamp(value: &str) -> Option<i64> {
    if value.is_empty() {
        return None;
    }
    value.parse::<i64>().ok().or_else(|| {
        chrono::DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|t| t.timestamp_millis())
    })
}
