//! The two renderings under comparison.
//!
//! Both are pure functions of `(task, data)`. Object key order follows the
//! input document (`serde_json` with `preserve_order`).

use serde_json::{Map, Value};

pub const CLOSING_INSTRUCTION: &str =
    "Please analyze this information and provide a detailed response.";

/// Which rendering a prompt was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Indented `key: value` text. Format one.
    Indented,
    /// Nested kebab-case tags. Format two.
    Markup,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Indented => "indented",
            Format::Markup => "markup",
        }
    }

    pub fn render(&self, task: &str, data: &Value) -> String {
        match self {
            Format::Indented => render_indented(task, data),
            Format::Markup => render_markup(task, data),
        }
    }
}

/// Indentation-based rendering.
pub fn render_indented(task: &str, data: &Value) -> String {
    let mut lines = Vec::new();
    match data {
        Value::Object(map) => indented_object(map, 0, &mut lines),
        Value::Array(items) => indented_items(items, 0, &mut lines),
        other => lines.push(scalar_text(other)),
    }
    let body = lines
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    format!("Task: {task}\n\nData:\n{body}\n\n{CLOSING_INSTRUCTION}")
}

fn indented_object(map: &Map<String, Value>, depth: usize, out: &mut Vec<String>) {
    let pad = "  ".repeat(depth);
    for (key, value) in map {
        match value {
            Value::Object(inner) => {
                out.push(format!("{pad}{key}:"));
                indented_object(inner, depth + 1, out);
            }
            Value::Array(items) => {
                out.push(format!("{pad}{key}:"));
                indented_items(items, depth + 1, out);
            }
            scalar => out.push(format!("{pad}{key}: {}", scalar_text(scalar))),
        }
    }
}

fn indented_items(items: &[Value], depth: usize, out: &mut Vec<String>) {
    let pad = "  ".repeat(depth);
    for (i, item) in items.iter().enumerate() {
        match item {
            Value::Object(inner) => {
                out.push(format!("{pad}{}.", i + 1));
                indented_object(inner, depth + 1, out);
            }
            Value::Array(_) => out.push(format!("{pad}- {item}")),
            scalar => out.push(format!("{pad}- {}", scalar_text(scalar))),
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Markup-tag rendering over `task`, `data` and `instructions` sections.
pub fn render_markup(task: &str, data: &Value) -> String {
    let sections = [
        ("task", Value::String(task.to_string())),
        ("data", data.clone()),
        ("instructions", Value::String(CLOSING_INSTRUCTION.to_string())),
    ];
    sections
        .iter()
        .map(|(tag, value)| {
            let mut lines = Vec::new();
            element(tag, value, 0, &mut lines);
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn element(tag: &str, value: &Value, depth: usize, out: &mut Vec<String>) {
    let pad = "  ".repeat(depth);
    let tag = kebab_case(tag);
    match value {
        Value::Object(map) if !map.is_empty() => {
            out.push(format!("{pad}<{tag}>"));
            for (key, inner) in map {
                element(key, inner, depth + 1, out);
            }
            out.push(format!("{pad}</{tag}>"));
        }
        Value::Array(items) if !items.is_empty() => {
            out.push(format!("{pad}<{tag}>"));
            for (i, item) in items.iter().enumerate() {
                element(&format!("{tag}-{}", i + 1), item, depth + 1, out);
            }
            out.push(format!("{pad}</{tag}>"));
        }
        Value::Object(_) | Value::Array(_) => out.push(format!("{pad}<{tag}></{tag}>")),
        scalar => out.push(format!(
            "{pad}<{tag}>{}</{tag}>",
            escape_text(&scalar_text(scalar))
        )),
    }
}

/// `maxParallel_jobs` -> `max-parallel-jobs`.
fn kebab_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else if ch.is_alphanumeric() || ch == '.' {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        } else {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev_lower = false;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("item");
    }
    out
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Value {
        json!({
            "request": {"service": "payments", "canary_percentage": 5},
            "approvals": ["dba-team", "tech-lead"],
            "steps": [{"name": "lint", "required": true}],
            "empty": {}
        })
    }

    #[test]
    fn indented_nests_two_spaces_per_level() {
        let prompt = render_indented("Plan the rollout.", &sample());
        let expected = [
            "Task: Plan the rollout.",
            "",
            "Data:",
            "request:",
            "  service: payments",
            "  canary_percentage: 5",
            "approvals:",
            "  - dba-team",
            "  - tech-lead",
            "steps:",
            "  1.",
            "    name: lint",
            "    required: true",
            "empty:",
            "",
            "Please analyze this information and provide a detailed response.",
        ]
        .join("\n");
        assert_eq!(prompt, expected);
    }

    #[test]
    fn markup_uses_kebab_tags_and_numbered_items() {
        let prompt = render_markup("Plan & ship", &sample());
        let expected = [
            "<task>Plan &amp; ship</task>",
            "",
            "<data>",
            "  <request>",
            "    <service>payments</service>",
            "    <canary-percentage>5</canary-percentage>",
            "  </request>",
            "  <approvals>",
            "    <approvals-1>dba-team</approvals-1>",
            "    <approvals-2>tech-lead</approvals-2>",
            "  </approvals>",
            "  <steps>",
            "    <steps-1>",
            "      <name>lint</name>",
            "      <required>true</required>",
            "    </steps-1>",
            "  </steps>",
            "  <empty></empty>",
            "</data>",
            "",
            "<instructions>Please analyze this information and provide a detailed response.</instructions>",
        ]
        .join("\n");
        assert_eq!(prompt, expected);
    }

    #[test]
    fn renderings_never_name_each_other() {
        let indented = Format::Indented.render("t", &sample());
        let markup = Format::Markup.render("t", &sample());
        assert!(!indented.contains('<'));
        assert!(markup.starts_with("<task>"));
        assert_ne!(indented, markup);
    }

    #[test]
    fn kebab_case_normalizes_keys() {
        assert_eq!(kebab_case("max_parallel_jobs"), "max-parallel-jobs");
        assert_eq!(kebab_case("replicationLag"), "replication-lag");
        assert_eq!(kebab_case("API key"), "api-key");
        assert_eq!(kebab_case("__"), "item");
    }
}
