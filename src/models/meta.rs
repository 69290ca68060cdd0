use crate::config::settings::FieldSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entry of `GET /field`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraField {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub clause_names: Vec<String>,
    #[serde(default)]
    pub schema: Option<FieldSchema>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraStatus {
    pub id: String,
    pub name: String,
    pub status_category: StatusCategory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCategory {
    #[serde(default)]
    pub key: Option<String>,
    pub color_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraUser {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

/// Response of `GET /jql/autocompletedata`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutocompleteData {
    #[serde(default)]
    pub visible_field_names: Vec<AutocompleteEntry>,
    #[serde(default)]
    pub visible_function_names: Vec<AutocompleteEntry>,
    #[serde(default)]
    pub jql_reserved_words: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutocompleteEntry {
    pub value: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Response of `GET /jql/autocompletedata/suggestions`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AutocompleteSuggestions {
    #[serde(default)]
    pub results: Vec<Suggestion>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub value: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Development information summary of an issue (branches, commits, pull requests).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DevStatus {
    #[serde(default)]
    pub summary: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DevStatus {
    /// `(kind, count)` pairs such as `("pullrequest", 2)`, skipping zero counts.
    pub fn counts(&self) -> Vec<(String, u64)> {
        self.summary
            .iter()
            .filter_map(|(kind, entry)| {
                let count = entry.get("overall")?.get("count")?.as_u64()?;
                (count > 0).then(|| (kind.clone(), count))
            })
            .collect()
    }
}
