use std::sync::LazyLock;

use regex::Regex;

use crate::models::DEFAULT_PROMPT_TITLE;

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder regex is valid"));

static SECTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(role|角色|goal|目标|input|输入|output(?: format)?|输出(?:格式)?|style|风格|constraints|约束|examples|示例|description|描述)\s*(?:[:：]\s*(.*))?$",
    )
    .expect("section regex is valid")
});

/// Structured fields recovered from free-form prompt text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPrompt {
    pub title: String,
    pub description: Option<String>,
    pub role: Option<String>,
    pub goal: Option<String>,
    /// `{{name}}` placeholders in order of first appearance
    pub placeholders: Vec<String>,
    /// Lines of an `Input:` section, used when there are no placeholders
    pub input_hints: Vec<String>,
    pub output_format: Option<String>,
    pub style: Option<String>,
    pub constraints: Vec<String>,
    pub examples: Vec<String>,
    /// Input text, unchanged
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Role,
    Goal,
    Input,
    Output,
    Style,
    Constraints,
    Examples,
    Description,
}

impl Section {
    fn from_heading(heading: &str) -> Option<Self> {
        let heading = heading.to_lowercase();
        let section = match heading.as_str() {
            "role" | "角色" => Section::Role,
            "goal" | "目标" => Section::Goal,
            "input" | "输入" => Section::Input,
            "style" | "风格" => Section::Style,
            "constraints" | "约束" => Section::Constraints,
            "examples" | "示例" => Section::Examples,
            "description" | "描述" => Section::Description,
            h if h.starts_with("output") || h.starts_with("输出") => Section::Output,
            _ => return None,
        };
        Some(section)
    }
}

/// Unique `{{name}}` placeholders in `text`, in order of first appearance.
pub fn placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_REGEX.captures_iter(text) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Replaces each `{{name}}` with `lookup(name)`.
pub(crate) fn fill_placeholders(template: &str, lookup: impl Fn(&str) -> String) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &regex::Captures<'_>| lookup(&caps[1]))
        .into_owned()
}

/// Recovers a title and labelled sections (`Role:`, `Goal:`, `Output:` ...)
/// from pasted prompt text.
///
/// The first line outside any section becomes the title. Without one, the
/// first 50 characters of the text are used.
pub fn parse_prompt_text(text: &str) -> ParsedPrompt {
    let mut parsed = ParsedPrompt {
        content: text.to_string(),
        ..Default::default()
    };

    let mut current: Option<Section> = None;
    let mut sections: Vec<(Section, Vec<String>)> = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(caps) = SECTION_REGEX.captures(line)
            && let Some(section) = Section::from_heading(&caps[1])
        {
            current = Some(section);
            sections.retain(|(s, _)| *s != section);
            let mut lines = Vec::new();
            if let Some(rest) = caps.get(2).map(|m| m.as_str().trim()).filter(|r| !r.is_empty()) {
                lines.push(rest.to_string());
            }
            sections.push((section, lines));
            continue;
        }

        match current {
            Some(section) => {
                if let Some((_, lines)) = sections.iter_mut().find(|(s, _)| *s == section) {
                    lines.push(line.to_string());
                }
            }
            None if parsed.title.is_empty() => parsed.title = line.to_string(),
            None => {}
        }
    }

    for (section, lines) in sections {
        if lines.is_empty() {
            continue;
        }
        match section {
            Section::Role => parsed.role = Some(lines.join(" ")),
            Section::Goal => parsed.goal = Some(lines.join(" ")),
            Section::Description => parsed.description = Some(lines.join(" ")),
            Section::Style => parsed.style = Some(lines.join(" ")),
            Section::Output => parsed.output_format = Some(lines.join("\n")),
            Section::Input => parsed.input_hints = lines,
            Section::Constraints => parsed.constraints = lines,
            Section::Examples => parsed.examples = lines,
        }
    }

    parsed.placeholders = placeholders(text);

    if parsed.title.is_empty() {
        let head: String = text.chars().take(50).collect();
        let head = head.replace(['\r', '\n'], " ");
        parsed.title = match head.trim() {
            "" => DEFAULT_PROMPT_TITLE.to_string(),
            t => t.to_string(),
        };
    }

    parsed
}
