use std::fmt::Write;

use chrono::{DateTime, Utc};

use super::format_millis;
use crate::models::Prompt;

/// Human-readable export: a preamble with the count, then one section per
/// prompt.
pub fn export_markdown(prompts: &[Prompt]) -> String {
    render(prompts, Utc::now())
}

fn render(prompts: &[Prompt], exported_at: DateTime<Utc>) -> String {
    let mut md = String::from("# Prompt Kit Export\n\n");
    let _ = writeln!(md, "Exported: {}", exported_at.to_rfc3339());
    let _ = writeln!(md, "Total: {} prompts\n", prompts.len());
    md.push_str("---\n\n");

    for (index, prompt) in prompts.iter().enumerate() {
        let _ = writeln!(md, "## {}. {}\n", index + 1, prompt.title);

        if let Some(description) = prompt.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(md, "**Description**: {}\n", description);
        }

        if !prompt.content.is_empty() {
            let fence = fence_for(&prompt.content);
            let _ = writeln!(md, "{fence}\n{}\n{fence}\n", prompt.content);
        }

        if !prompt.tags.is_empty() {
            let _ = writeln!(md, "**Tags**: {}\n", prompt.tags.join(", "));
        }

        md.push_str("**Metadata**:\n");
        let _ = writeln!(md, "- ID: {}", prompt.id);
        let _ = writeln!(md, "- Created: {}", format_millis(prompt.created_at));
        let _ = writeln!(md, "- Updated: {}\n", format_millis(prompt.updated_at));
        md.push_str("---\n\n");
    }

    md
}

/// A backtick fence longer than any run inside `content`.
fn fence_for(content: &str) -> String {
    let longest = content
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}
