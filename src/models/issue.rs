use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Issue as returned by Jira. Everything except the key, `fields` included,
/// stays in `extra` untouched so the issue serializes back to the server's shape.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JiraIssue {
    pub key: String,
    /// Alias of the account the issue was fetched with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JiraIssue {
    pub fn id(&self) -> Option<&str> {
        self.extra.get("id")?.as_str()
    }

    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.extra.get("fields")?.as_object()
    }

    pub fn fields_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.extra.get_mut("fields")?.as_object_mut()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields()?.get(name).filter(|v| !v.is_null())
    }

    pub fn summary(&self) -> &str {
        self.field("summary").and_then(Value::as_str).unwrap_or("")
    }

    pub fn status_name(&self) -> Option<&str> {
        self.field("status")?.get("name")?.as_str()
    }

    /// Fallback when the status colour cache is empty.
    pub fn status_category_color(&self) -> Option<&str> {
        self.field("status")?
            .get("statusCategory")?
            .get("colorName")?
            .as_str()
    }

    pub fn assignee_name(&self) -> Option<&str> {
        display_name(self.field("assignee")?)
    }

    pub fn reporter_name(&self) -> Option<&str> {
        display_name(self.field("reporter")?)
    }

    pub fn issue_type_name(&self) -> Option<&str> {
        self.field("issuetype")?.get("name")?.as_str()
    }

    pub fn priority_name(&self) -> Option<&str> {
        self.field("priority")?.get("name")?.as_str()
    }
}

fn display_name(user: &Value) -> Option<&str> {
    user.get("displayName")?.as_str()
}

/// Response of `POST /search/jql`. Paging keys are read from `extra` so an
/// absent key and an explicit `null` both survive re-serialization.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SearchResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<JiraIssue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchResults {
    pub fn issues(&self) -> &[JiraIssue] {
        self.issues.as_deref().unwrap_or_default()
    }

    pub fn into_issues(self) -> Vec<JiraIssue> {
        self.issues.unwrap_or_default()
    }

    pub fn next_page_token(&self) -> Option<&str> {
        self.extra.get("nextPageToken")?.as_str()
    }

    pub fn is_last(&self) -> Option<bool> {
        self.extra.get("isLast")?.as_bool()
    }

    /// Whether the server has more pages after this one.
    pub fn has_more(&self) -> bool {
        !self.is_last().unwrap_or(false) && self.next_page_token().is_some()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IssueCount {
    pub count: u64,
}
