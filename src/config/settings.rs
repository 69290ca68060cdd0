use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE_PATH: &str = "/rest/api/3";
pub const DEFAULT_SEARCH_RESULTS_LIMIT: i64 = 10;

const ENV_PREFIX: &str = "JIRA_INLINE";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Preferences {
    pub search_results_limit: i64,
    pub search_columns: Vec<String>,
    pub log_requests_and_responses: bool,
    pub log_images_fetch: bool,
    pub api_base_path: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            search_results_limit: DEFAULT_SEARCH_RESULTS_LIMIT,
            search_columns: ["key", "type", "updated", "assignee", "priority", "status", "summary"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            log_requests_and_responses: false,
            log_images_fetch: false,
            api_base_path: DEFAULT_API_BASE_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Account {
    pub alias: String,
    pub host: String,
    pub authentication: Authentication,
    #[serde(default)]
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub cache: AccountCache,
}

#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Authentication {
    /// Jira Server / Data Center with username and password.
    Basic { username: String, password: String },
    /// Jira Cloud with account email and API token.
    Cloud { username: String, api_token: String },
    /// Personal access token.
    BearerToken { token: String },
}

// Never print secrets, even through `{:?}` in a log line.
impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authentication::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Authentication::Cloud { username, .. } => f
                .debug_struct("Cloud")
                .field("username", username)
                .field("api_token", &"***")
                .finish(),
            Authentication::BearerToken { .. } => {
                f.debug_struct("BearerToken").field("token", &"***").finish()
            }
        }
    }
}

impl Authentication {
    pub fn label(&self) -> &'static str {
        match self {
            Authentication::Basic { .. } => "Basic",
            Authentication::Cloud { .. } => "Jira Cloud",
            Authentication::BearerToken { .. } => "Bearer Token",
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Authentication::Basic { username, .. } | Authentication::Cloud { username, .. } => {
                Some(username)
            }
            Authentication::BearerToken { .. } => None,
        }
    }

    pub fn masked_secret(&self) -> String {
        let secret = match self {
            Authentication::Basic { password, .. } => password,
            Authentication::Cloud { api_token, .. } => api_token,
            Authentication::BearerToken { token } => token,
        };
        mask(secret)
    }

    fn with_secret(&self, secret: String) -> Self {
        match self {
            Authentication::Basic { username, .. } => Authentication::Basic {
                username: username.clone(),
                password: secret,
            },
            Authentication::Cloud { username, .. } => Authentication::Cloud {
                username: username.clone(),
                api_token: secret,
            },
            Authentication::BearerToken { .. } => Authentication::BearerToken { token: secret },
        }
    }
}

fn mask(secret: &str) -> String {
    if secret.chars().count() <= 8 {
        return "***".to_string();
    }
    let head: String = secret.chars().take(4).collect();
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{}***{}", head, tail)
}

/// Metadata fetched from one Jira instance. Keys are only meaningful for that account.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AccountCache {
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub status_color: HashMap<String, String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom_fields_id_to_name: HashMap<String, String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom_fields_name_to_id: HashMap<String, String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom_fields_type: HashMap<String, FieldSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jql_autocomplete: Option<JqlAutocompleteCache>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct JqlAutocompleteCache {
    pub fields: Vec<String>,
    /// Function names grouped by the field type they return.
    pub functions: BTreeMap<String, Vec<String>>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Configuration not found. Run 'jira-inline account add' to set up an account."
            );
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path).context("Failed to read config file")?;

        let mut settings: Settings =
            toml::from_str(&config_str).context("Failed to parse config file")?;

        settings.preferences = layered_preferences(&config_str)?;

        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let config_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, config_str).context("Failed to write config file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(config_path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(config_path, perms)?;
        }

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".jira-inline"))
    }

    pub fn account(&self, alias: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.alias == alias)
    }

    pub fn account_mut(&mut self, alias: &str) -> Option<&mut Account> {
        self.accounts.iter_mut().find(|a| a.alias == alias)
    }

    /// Adds the account, replacing any existing one with the same alias.
    pub fn upsert_account(&mut self, account: Account) {
        match self.account_mut(&account.alias) {
            Some(existing) => *existing = account,
            None => self.accounts.push(account),
        }
        self.sort_accounts();
    }

    pub fn remove_account(&mut self, alias: &str) -> bool {
        let before = self.accounts.len();
        self.accounts.retain(|a| a.alias != alias);
        self.accounts.len() != before
    }

    pub fn sort_accounts(&mut self) {
        // stable: equal priorities keep their configured order
        self.accounts.sort_by_key(|a| a.priority);
    }

    /// Applies a `section.field` assignment from the command line.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["preferences", "search_results_limit"] => {
                self.preferences.search_results_limit =
                    value.parse().context("search_results_limit must be a number")?
            }
            ["preferences", "search_columns"] => {
                self.preferences.search_columns = value
                    .split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect()
            }
            ["preferences", "log_requests_and_responses"] => {
                self.preferences.log_requests_and_responses =
                    value.parse().context("Expected true or false")?
            }
            ["preferences", "log_images_fetch"] => {
                self.preferences.log_images_fetch =
                    value.parse().context("Expected true or false")?
            }
            ["preferences", "api_base_path"] => self.preferences.api_base_path = value.to_string(),
            ["accounts", alias, field] => {
                let account = self
                    .account_mut(alias)
                    .with_context(|| format!("Account '{}' not found", alias))?;
                match *field {
                    "host" => account.host = value.trim_end_matches('/').to_string(),
                    "priority" => {
                        account.priority = value.parse().context("priority must be a number")?
                    }
                    "color" => account.color = Some(value.to_string()),
                    "token" | "password" | "api_token" => {
                        account.authentication = account.authentication.with_secret(value.to_string())
                    }
                    _ => anyhow::bail!("Unknown configuration key: {}", key),
                }
                self.sort_accounts();
            }
            _ => anyhow::bail!(
                "Unknown configuration key: {}. Use section.field (e.g., preferences.log_images_fetch)",
                key
            ),
        }

        Ok(())
    }
}

#[derive(Deserialize)]
struct PreferencesLayer {
    #[serde(default)]
    preferences: Preferences,
}

/// File preferences overridden by `JIRA_INLINE__PREFERENCES__<FIELD>` variables.
fn layered_preferences(config_str: &str) -> Result<Preferences> {
    layered_preferences_from(config_str, None)
}

/// `env` replaces the process environment when given.
fn layered_preferences_from(
    config_str: &str,
    env: Option<config::Map<String, String>>,
) -> Result<Preferences> {
    use config::{Config, Environment, File, FileFormat};

    let layer = Config::builder()
        .add_source(File::from_str(config_str, FileFormat::Toml))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("preferences.search_columns")
                .source(env),
        )
        .build()
        .context("Failed to layer configuration")?
        .try_deserialize::<PreferencesLayer>()
        .context("Invalid preferences")?;

    Ok(layer.preferences)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_settings() -> Settings {
        Settings {
            preferences: Preferences::default(),
            accounts: vec![
                Account {
                    alias: "cloud".to_string(),
                    host: "https://example.atlassian.net".to_string(),
                    authentication: Authentication::Cloud {
                        username: "test@example.com".to_string(),
                        api_token: "cloud-token-123456".to_string(),
                    },
                    priority: 2,
                    color: None,
                    cache: AccountCache::default(),
                },
                Account {
                    alias: "onprem".to_string(),
                    host: "https://jira.example.com".to_string(),
                    authentication: Authentication::BearerToken {
                        token: "pat-abcdefgh1234".to_string(),
                    },
                    priority: 1,
                    color: Some("#ff0000".to_string()),
                    cache: AccountCache::default(),
                },
            ],
        }
    }

    #[test]
    fn test_config_serialization() {
        let mut settings = sample_settings();
        settings.accounts[0]
            .cache
            .status_color
            .insert("In Progress".to_string(), "yellow".to_string());

        let toml_str = toml::to_string(&settings).unwrap();
        assert!(toml_str.contains("https://example.atlassian.net"));
        assert!(toml_str.contains("bearer_token"));

        let deserialized: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.accounts.len(), 2);
        assert_eq!(
            deserialized.accounts[0].cache.status_color.get("In Progress"),
            Some(&"yellow".to_string())
        );
        assert_eq!(deserialized.preferences.api_base_path, "/rest/api/3");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = sample_settings();
        settings.preferences.log_images_fetch = true;
        settings.preferences.search_columns = vec!["key".to_string(), "$Story Points".to_string()];
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.accounts[1].alias, "onprem");
        assert!(loaded.preferences.log_images_fetch);
        assert_eq!(loaded.preferences.search_columns[1], "$Story Points");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_missing_preferences_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "accounts = []\n").unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.preferences.search_results_limit, 10);
        assert!(!loaded.preferences.log_requests_and_responses);
    }

    #[test]
    fn test_env_overrides_preferences() {
        let env: config::Map<String, String> = [
            ("JIRA_INLINE__PREFERENCES__SEARCH_COLUMNS", "key,summary"),
            ("JIRA_INLINE__PREFERENCES__SEARCH_RESULTS_LIMIT", "25"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let prefs = layered_preferences_from("[preferences]\nlog_images_fetch = true\n", Some(env))
            .unwrap();

        assert_eq!(prefs.search_columns, vec!["key", "summary"]);
        assert_eq!(prefs.search_results_limit, 25);
        assert!(prefs.log_images_fetch);
    }

    #[test]
    fn test_config_load_missing_file() {
        let result = Settings::load_from(Path::new("/nonexistent/jira-inline/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_sort_and_lookup_accounts() {
        let mut settings = sample_settings();
        settings.sort_accounts();
        assert_eq!(settings.accounts[0].alias, "onprem");
        assert!(settings.account("cloud").is_some());
        assert!(settings.account("missing").is_none());
    }

    #[test]
    fn test_upsert_and_remove_account() {
        let mut settings = sample_settings();
        let mut replacement = settings.accounts[0].clone();
        replacement.priority = 0;
        settings.upsert_account(replacement);

        assert_eq!(settings.accounts.len(), 2);
        assert_eq!(settings.accounts[0].alias, "cloud");

        assert!(settings.remove_account("cloud"));
        assert!(!settings.remove_account("cloud"));
        assert_eq!(settings.accounts.len(), 1);
    }

    #[test]
    fn test_set_value() {
        let mut settings = sample_settings();
        settings.set_value("preferences.search_results_limit", "25").unwrap();
        settings.set_value("accounts.cloud.token", "new-secret-value").unwrap();
        settings.set_value("accounts.cloud.priority", "0").unwrap();

        assert_eq!(settings.preferences.search_results_limit, 25);
        assert_eq!(settings.accounts[0].alias, "cloud");
        assert_eq!(
            settings.accounts[0].authentication,
            Authentication::Cloud {
                username: "test@example.com".to_string(),
                api_token: "new-secret-value".to_string(),
            }
        );

        assert!(settings.set_value("jira.url", "x").is_err());
        assert!(settings.set_value("accounts.nobody.host", "x").is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let auth = Authentication::Basic {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
        };
        let printed = format!("{:?}", auth);
        assert!(printed.contains("admin"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_masked_secret() {
        let auth = Authentication::BearerToken {
            token: "abcd1234efgh5678".to_string(),
        };
        assert_eq!(auth.masked_secret(), "abcd***5678");

        let short = Authentication::BearerToken {
            token: "short".to_string(),
        };
        assert_eq!(short.masked_secret(), "***");
    }
}
