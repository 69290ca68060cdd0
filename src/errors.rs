use colored::*;
use std::fmt;

#[derive(Debug)]
pub enum JiraError {
    // Jira answered with a non-success status
    Api { status: u16, message: String },

    // The request never produced a response
    Network(String),

    // Response body could not be decoded
    Json(String),

    // Account errors
    NoAccounts,
    AccountNotFound(String),

    // Configuration errors
    Config(String),
}

impl JiraError {
    pub fn status(&self) -> Option<u16> {
        match self {
            JiraError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short, colored advice printed by the CLI under the error message.
    pub fn hint(&self) -> Option<String> {
        match self {
            JiraError::Api { status: 401, .. } | JiraError::Api { status: 403, .. } => Some(format!(
                "   To fix:\n   1. Generate a new token: {}\n   2. Update the account: {}",
                "https://id.atlassian.com/manage-profile/security/api-tokens".cyan(),
                "jira-inline account add".green()
            )),
            JiraError::Api { status: 400, .. } => Some(format!(
                "   {}",
                "Check the JQL syntax, field names and quoting".dimmed()
            )),
            JiraError::Network(_) => Some(format!(
                "   To fix:\n   1. Check your internet connection\n   2. Verify the account host: {}",
                "jira-inline account list".green()
            )),
            JiraError::NoAccounts => Some(format!(
                "   Add one with: {}",
                "jira-inline account add".green()
            )),
            JiraError::AccountNotFound(_) => Some(format!(
                "   List configured accounts: {}",
                "jira-inline account list".green()
            )),
            _ => None,
        }
    }
}

impl fmt::Display for JiraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // The message is already the final, user-facing text
            JiraError::Api { message, .. } => write!(f, "{}", message),
            JiraError::Network(msg) => write!(f, "Jira API request failed: {}", msg),
            JiraError::Json(msg) => write!(f, "Failed to parse Jira response: {}", msg),
            JiraError::NoAccounts => write!(f, "No Jira account configured"),
            JiraError::AccountNotFound(alias) => write!(f, "Account '{}' not found", alias),
            JiraError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for JiraError {}

impl From<reqwest::Error> for JiraError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            JiraError::Json(err.to_string())
        } else {
            JiraError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for JiraError {
    fn from(err: serde_json::Error) -> Self {
        JiraError::Json(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, JiraError>;
