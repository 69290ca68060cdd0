//! Terminal rendering of issues, search tables and counts.

use crate::models::issue::JiraIssue;
use colored::*;
use serde_json::Value;

const SUMMARY_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Key,
    Type,
    Created,
    Updated,
    Reporter,
    Assignee,
    Priority,
    Status,
    Summary,
    Due,
    Labels,
    /// `$Name` in the column list, resolved through the custom fields cache.
    Custom(String),
}

impl Column {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(name) = raw.strip_prefix('$') {
            return (!name.is_empty()).then(|| Column::Custom(name.to_string()));
        }
        let column = match raw.to_lowercase().as_str() {
            "key" => Column::Key,
            "type" => Column::Type,
            "created" => Column::Created,
            "updated" => Column::Updated,
            "reporter" => Column::Reporter,
            "assignee" => Column::Assignee,
            "priority" => Column::Priority,
            "status" => Column::Status,
            "summary" => Column::Summary,
            "due" | "duedate" => Column::Due,
            "labels" => Column::Labels,
            _ => return None,
        };
        Some(column)
    }

    pub fn header(&self) -> String {
        match self {
            Column::Custom(name) => name.clone(),
            other => format!("{:?}", other),
        }
    }

    /// Jira field id to request, `None` for the key and unresolved custom fields.
    pub fn field_id(&self, resolve_custom: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        let id = match self {
            Column::Key => return None,
            Column::Type => "issuetype",
            Column::Created => "created",
            Column::Updated => "updated",
            Column::Reporter => "reporter",
            Column::Assignee => "assignee",
            Column::Priority => "priority",
            Column::Status => "status",
            Column::Summary => "summary",
            Column::Due => "duedate",
            Column::Labels => "labels",
            Column::Custom(name) => return resolve_custom(name),
        };
        Some(id.to_string())
    }
}

pub fn parse_columns(raw: &[String]) -> Vec<Column> {
    raw.iter().filter_map(|c| Column::parse(c)).collect()
}

/// Field list for a search showing `columns`. Status is always requested for the badge.
pub fn fields_for_columns(
    columns: &[Column],
    resolve_custom: &dyn Fn(&str) -> Option<String>,
) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for id in columns
        .iter()
        .filter_map(|c| c.field_id(resolve_custom))
        .chain(std::iter::once("status".to_string()))
    {
        if !fields.contains(&id) {
            fields.push(id);
        }
    }
    fields
}

pub fn status_badge(name: &str, color_name: Option<&str>) -> ColoredString {
    let label = name.to_uppercase();
    match color_name {
        Some("green") => label.green().bold(),
        Some("yellow") => label.yellow().bold(),
        Some("blue") => label.blue().bold(),
        Some("blue-gray") | Some("medium-gray") => label.bright_black().bold(),
        _ => label.normal(),
    }
}

/// `KEY [STATUS] summary`
pub fn issue_line(issue: &JiraIssue, status_color: Option<&str>) -> String {
    let status = issue.status_name().unwrap_or("Unknown");
    let color = status_color.or_else(|| issue.status_category_color());
    format!(
        "{} [{}]  {}",
        issue.key.bright_white().bold(),
        status_badge(status, color),
        issue.summary()
    )
}

/// Alias in the account's configured colour: a name (`cyan`, `bright blue`) or `#rrggbb`.
pub fn account_label(alias: &str, color: Option<&str>) -> ColoredString {
    match color.and_then(parse_color) {
        Some(color) => alias.color(color).bold(),
        None => alias.bright_white().bold(),
    }
}

fn parse_color(raw: &str) -> Option<Color> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix('#') {
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        return Some(Color::TrueColor {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        });
    }
    raw.parse().ok()
}

pub fn count_line(jql: &str, count: u64) -> String {
    format!("{} {}", count.to_string().bright_white().bold(), jql.dimmed())
}

pub fn cell(issue: &JiraIssue, column: &Column, field_id: Option<&str>) -> String {
    if *column == Column::Key {
        return issue.key.clone();
    }
    let value = match field_id.and_then(|id| issue.field(id)) {
        Some(value) => value,
        None => return String::new(),
    };

    match column {
        Column::Created | Column::Updated => {
            // 2024-05-01T09:00:00.000+0000 -> 2024-05-01
            value
                .as_str()
                .map(|s| s.chars().take(10).collect::<String>())
                .unwrap_or_default()
        }
        Column::Summary => truncate(value.as_str().unwrap_or(""), SUMMARY_WIDTH),
        _ => value_text(value),
    }
}

/// Human readable form of an arbitrary field value.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => ["displayName", "name", "value", "key"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_default(),
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Plain-text table, one row per issue, columns padded to their widest cell.
pub fn render_table(
    issues: &[JiraIssue],
    columns: &[Column],
    resolve_custom: &dyn Fn(&str) -> Option<String>,
) -> String {
    let ids: Vec<Option<String>> = columns.iter().map(|c| c.field_id(resolve_custom)).collect();

    let headers: Vec<String> = columns.iter().map(Column::header).collect();
    let rows: Vec<Vec<String>> = issues
        .iter()
        .map(|issue| {
            columns
                .iter()
                .zip(&ids)
                .map(|(column, id)| cell(issue, column, id.as_deref()))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = (0..columns.len())
        .map(|i| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(headers[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let pad = |text: &str, width: usize| {
        let fill = width.saturating_sub(text.chars().count());
        format!("{}{}", text, " ".repeat(fill))
    };

    let mut out = String::new();
    let header_line: Vec<String> = headers.iter().zip(&widths).map(|(h, w)| pad(h, *w)).collect();
    out.push_str(&header_line.join("  ").bold().to_string());
    out.push('\n');

    for row in rows {
        let line: Vec<String> = row.iter().zip(&widths).map(|(c, w)| pad(c, *w)).collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue() -> JiraIssue {
        serde_json::from_value(json!({
            "key": "TEST-1",
            "fields": {
                "summary": "Login fails on Safari",
                "status": { "name": "In Progress", "statusCategory": { "colorName": "yellow" } },
                "assignee": { "displayName": "Alice" },
                "updated": "2024-05-01T09:00:00.000+0000",
                "labels": ["frontend", "safari"],
                "customfield_10016": 5
            }
        }))
        .unwrap()
    }

    fn story_points(name: &str) -> Option<String> {
        (name == "Story Points").then(|| "customfield_10016".to_string())
    }

    #[test]
    fn test_parse_columns() {
        let raw: Vec<String> = ["KEY", "summary", "$Story Points", "bogus", "$"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            parse_columns(&raw),
            vec![
                Column::Key,
                Column::Summary,
                Column::Custom("Story Points".to_string())
            ]
        );
    }

    #[test]
    fn test_fields_for_columns() {
        let columns = vec![
            Column::Key,
            Column::Status,
            Column::Custom("Story Points".to_string()),
            Column::Custom("Unknown".to_string()),
        ];
        assert_eq!(
            fields_for_columns(&columns, &story_points),
            vec!["status", "customfield_10016"]
        );
    }

    #[test]
    fn test_cells() {
        let issue = issue();
        assert_eq!(cell(&issue, &Column::Key, None), "TEST-1");
        assert_eq!(cell(&issue, &Column::Updated, Some("updated")), "2024-05-01");
        assert_eq!(cell(&issue, &Column::Assignee, Some("assignee")), "Alice");
        assert_eq!(cell(&issue, &Column::Labels, Some("labels")), "frontend, safari");
        assert_eq!(
            cell(&issue, &Column::Custom("Story Points".to_string()), Some("customfield_10016")),
            "5"
        );
        assert_eq!(cell(&issue, &Column::Reporter, Some("reporter")), "");
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("cyan"), Some(Color::Cyan));
        assert_eq!(parse_color("bright blue"), Some(Color::BrightBlue));
        assert_eq!(
            parse_color("#ff8000"),
            Some(Color::TrueColor { r: 255, g: 128, b: 0 })
        );
        assert_eq!(parse_color("#ff80"), None);
        assert_eq!(parse_color("#gg0000"), None);
        assert_eq!(parse_color("not-a-colour"), None);
    }

    #[test]
    fn test_account_label_text() {
        colored::control::set_override(false);
        assert_eq!(account_label("work", Some("#ff0000")).to_string(), "work");
        assert_eq!(account_label("work", None).to_string(), "work");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_render_table_alignment() {
        colored::control::set_override(false);
        let columns = vec![Column::Key, Column::Assignee];
        let table = render_table(&[issue()], &columns, &story_points);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Key     Assignee");
        assert_eq!(lines[1], "TEST-1  Alice");
    }

    #[test]
    fn test_issue_line_uses_category_color_fallback() {
        colored::control::set_override(false);
        assert_eq!(issue_line(&issue(), None), "TEST-1 [IN PROGRESS]  Login fails on Safari");
    }
}
