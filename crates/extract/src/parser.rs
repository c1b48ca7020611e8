//! Turns free-text agent replies into table rows.
//!
//! The agent is asked for a JSON array but does not always comply: replies
//! arrive wrapped in code fences, embedded in prose, as a single object, or
//! as a Markdown table. Parsing never panics or errors; the caller gets a
//! [`ParseOutcome`] and decides what to skip.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::warn;

use crate::schema::ExtractedRow;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z]*").expect("code fence pattern is valid"));

const WRAPPER_KEYS: [&str; 3] = ["results", "rows", "data"];

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Rows(Vec<ExtractedRow>),
    Failure(String),
}

pub fn parse_table(text: &str) -> ParseOutcome {
    let cleaned = CODE_FENCE.replace_all(text, "");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return ParseOutcome::Failure("empty response".to_string());
    }

    if let Some(value) = find_json(cleaned) {
        return rows_from_json(value);
    }

    match parse_markdown_table(cleaned) {
        Some(rows) => ParseOutcome::Rows(rows),
        None => ParseOutcome::Failure(format!(
            "no JSON or table found in response starting with: {}",
            cleaned.chars().take(80).collect::<String>()
        )),
    }
}

/// Whole text first, then the outermost array, then the outermost object
fn find_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if value.is_array() || value.is_object() {
            return Some(value);
        }
    }

    [('[', ']'), ('{', '}')].into_iter().find_map(|(open, close)| {
        let start = text.find(open)?;
        let end = text.rfind(close)?;
        if end <= start {
            return None;
        }
        serde_json::from_str::<Value>(&text[start..=end]).ok()
    })
}

fn rows_from_json(value: Value) -> ParseOutcome {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let wrapped = WRAPPER_KEYS
                .iter()
                .find(|key| map.get(**key).is_some_and(Value::is_array))
                .and_then(|key| map.remove(*key));
            match wrapped {
                Some(Value::Array(items)) => items,
                _ => vec![Value::Object(map)],
            }
        }
        other => return ParseOutcome::Failure(format!("unexpected JSON value: {}", other)),
    };

    let mut rows = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => {
                let row = ExtractedRow::from_pairs(map.into_iter().map(|(k, v)| (k, json_to_cell(v))));
                rows.push(row);
            }
            other => warn!(index, value = %other, "Skipping non-object row in agent response"),
        }
    }

    ParseOutcome::Rows(rows)
}

fn json_to_cell(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .into_iter()
            .map(json_to_cell)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn parse_markdown_table(text: &str) -> Option<Vec<ExtractedRow>> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('|') || line.matches('|').count() >= 2);

    let headers = split_table_line(lines.next()?);
    if headers.len() < 2 || headers.iter().all(|h| h.is_empty()) {
        return None;
    }

    let mut rows = Vec::new();
    for (index, line) in lines.enumerate() {
        if is_separator(line) {
            continue;
        }
        let cells = split_table_line(line);
        if cells.len() != headers.len() {
            warn!(
                index,
                expected = headers.len(),
                found = cells.len(),
                "Skipping malformed table row in agent response"
            );
            continue;
        }
        rows.push(ExtractedRow::from_pairs(headers.iter().cloned().zip(cells)));
    }

    Some(rows)
}

fn split_table_line(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn is_separator(line: &str) -> bool {
    line.contains('-') && line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(outcome: ParseOutcome) -> Vec<ExtractedRow> {
        match outcome {
            ParseOutcome::Rows(rows) => rows,
            ParseOutcome::Failure(reason) => panic!("expected rows, got failure: {}", reason),
        }
    }

    #[test]
    fn test_plain_json_array() {
        let parsed = rows(parse_table(
            r#"[{"System Name": "Billing", "Environment Type": "DEV"},
                {"System Name": "Billing", "Environment Type": "PROD"}]"#,
        ));
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].get("Environment Type"), Some("PROD"));
    }

    #[test]
    fn test_fenced_json_with_prose() {
        let text = "Here is the data you asked for:\n```json\n[{\"System Name\": \"CRM\", \"Port\": 443, \"Notes\": null}]\n```\nLet me know.";
        let parsed = rows(parse_table(text));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].get("Port"), Some("443"));
        assert_eq!(parsed[0].get("Notes"), Some(""));
    }

    #[test]
    fn test_wrapped_results_and_single_object() {
        let parsed = rows(parse_table(r#"{"results": [{"System_Name": "A"}, {"System_Name": "B"}]}"#));
        assert_eq!(parsed.len(), 2);

        let parsed = rows(parse_table(r#"{"System_Name": "A", "Reason": "ok"}"#));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].get("Reason"), Some("ok"));
    }

    #[test]
    fn test_non_object_items_are_skipped() {
        let parsed = rows(parse_table(r#"[{"System Name": "A"}, "garbage", 42]"#));
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_array_values_are_joined() {
        let parsed = rows(parse_table(r#"[{"Environment Types": ["DEV", "PROD"]}]"#));
        assert_eq!(parsed[0].get("Environment Types"), Some("DEV, PROD"));
    }

    #[test]
    fn test_columns_keep_reply_order() {
        let parsed = rows(parse_table(r#"[{"System Name": "Billing", "Zone": "eu-west", "Owner": "ops"}]"#));
        let columns: Vec<&str> = parsed[0].columns().collect();
        assert_eq!(columns, vec!["System Name", "Zone", "Owner"]);
    }

    #[test]
    fn test_markdown_table() {
        let text = "\
| System Name | Environment Type | Hostname |
|-------------|:----------------:|----------|
| Billing     | DEV              | bill-d1  |
| Billing     | PROD             |
| Billing     | TEST             | bill-t1  |";
        let parsed = rows(parse_table(text));
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].get("Hostname"), Some("bill-t1"));
    }

    #[test]
    fn test_unparsable_text_is_failure() {
        assert!(matches!(parse_table("I could not find any servers."), ParseOutcome::Failure(_)));
        assert!(matches!(parse_table("   "), ParseOutcome::Failure(_)));
        assert_eq!(parse_table("[]"), ParseOutcome::Rows(vec![]));
    }
}
