//! Per-account metadata caches: status colours, custom fields, JQL autocomplete.

use super::jira::JiraClient;
use super::request::Request;
use crate::config::settings::{AccountCache, JqlAutocompleteCache};
use crate::errors::{JiraError, Result};
use crate::models::meta::{AutocompleteData, AutocompleteSuggestions, JiraField, JiraStatus};

impl JiraClient {
    /// Colour name of `status` on the given account, fetched once then served from cache.
    pub async fn update_status_color_cache(&mut self, status: &str, alias: &str) -> Result<String> {
        if let Some(color) = self.account(alias)?.cache.status_color.get(status) {
            return Ok(color.clone());
        }

        let fetched: JiraStatus = {
            let request = Request::get(format!("/status/{}", urlencoding::encode(status)))
                .account(Some(self.account(alias)?));
            self.send(&request).await?.json()?
        };

        let color = fetched.status_category.color_name;
        self.cache_mut(alias)?
            .status_color
            .insert(status.to_string(), color.clone());

        Ok(color)
    }

    /// Rebuilds the custom field maps of every account and the list of JQL columns.
    /// An account that cannot be reached keeps its previous maps.
    pub async fn update_custom_fields_cache(&mut self) -> Result<()> {
        self.columns.clear();
        let aliases: Vec<String> = self
            .settings()
            .accounts
            .iter()
            .map(|a| a.alias.clone())
            .collect();

        for alias in aliases {
            let fetched: Result<Vec<JiraField>> = {
                let request = Request::get("/field").account(Some(self.account(&alias)?));
                match self.send(&request).await {
                    Ok(dispatched) => dispatched.json(),
                    Err(e) => Err(e),
                }
            };

            let fields = match fetched {
                Ok(fields) => fields,
                Err(e) => {
                    tracing::error!(account = %alias, error = %e, "Failed to retrieve custom fields");
                    continue;
                }
            };

            let cache = self.cache_mut(&alias)?;
            cache.custom_fields_id_to_name.clear();
            cache.custom_fields_name_to_id.clear();
            cache.custom_fields_type.clear();

            let mut clause_names = Vec::new();
            for field in fields {
                if let (true, Some(schema)) = (field.custom, field.schema.as_ref()) {
                    if let Some(custom_id) = schema.custom_id {
                        let id = custom_id.to_string();
                        cache
                            .custom_fields_id_to_name
                            .insert(id.clone(), field.name.clone());
                        cache
                            .custom_fields_name_to_id
                            .insert(field.name.clone(), id.clone());
                        cache.custom_fields_type.insert(id, schema.clone());
                    }
                }
                clause_names.extend(field.clause_names);
            }

            tracing::debug!(
                account = %alias,
                custom_fields = cache.custom_fields_id_to_name.len(),
                "Custom fields cached"
            );
            self.columns.extend(clause_names);
        }

        Ok(())
    }

    /// Caches JQL field and function names in the account that answered.
    pub async fn update_jql_autocomplete_cache(&mut self) -> Result<JqlAutocompleteCache> {
        let (alias, data) = {
            let request = Request::get("/jql/autocompletedata");
            let dispatched = self.send(&request).await?;
            let data: AutocompleteData = dispatched.json()?;
            (dispatched.account.alias.clone(), data)
        };

        let mut autocomplete = JqlAutocompleteCache {
            fields: data.visible_field_names.into_iter().map(|f| f.value).collect(),
            ..Default::default()
        };
        for function in data.visible_function_names {
            for kind in &function.types {
                autocomplete
                    .functions
                    .entry(kind.clone())
                    .or_default()
                    .push(function.value.clone());
            }
        }

        self.cache_mut(&alias)?.jql_autocomplete = Some(autocomplete.clone());
        Ok(autocomplete)
    }

    pub async fn get_jql_autocomplete_field(
        &self,
        field_name: &str,
        field_value: &str,
    ) -> Result<AutocompleteSuggestions> {
        let request = Request::get("/jql/autocompletedata/suggestions")
            .query("fieldName", field_name)
            .query("fieldValue", field_value);

        self.send(&request).await?.json()
    }

    /// `customfield_<id>` for a custom field name on the given account.
    pub fn custom_field_key(&self, alias: &str, name: &str) -> Option<String> {
        let account = self.settings().account(alias)?;
        account
            .cache
            .custom_fields_name_to_id
            .get(name)
            .map(|id| format!("customfield_{}", id))
    }

    fn cache_mut(&mut self, alias: &str) -> Result<&mut AccountCache> {
        self.settings_mut()
            .account_mut(alias)
            .map(|a| &mut a.cache)
            .ok_or_else(|| JiraError::AccountNotFound(alias.to_string()))
    }
}
