use super::auth::build_headers;
use super::request::{build_url, classify, Dispatch, Failure, RawResponse, Request, Step};
use super::search::{build_search_body, SearchOptions, APPROXIMATE_COUNT_PATH, SEARCH_JQL_PATH};
use crate::config::settings::{Account, Settings};
use crate::errors::{JiraError, Result};
use crate::models::issue::{IssueCount, JiraIssue, SearchResults};
use crate::models::meta::{DevStatus, JiraUser};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;

/// Jira REST client over every configured account.
pub struct JiraClient {
    client: Client,
    settings: Settings,
    /// JQL clause names of every account, refreshed with the custom fields cache.
    pub(crate) columns: Vec<String>,
}

/// Successful response together with the account that produced it.
pub struct Dispatched<'a> {
    pub account: &'a Account,
    pub response: RawResponse,
}

impl Dispatched<'_> {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        self.response.json()
    }
}

impl JiraClient {
    pub fn new(mut settings: Settings) -> Self {
        settings.sort_accounts();
        Self {
            client: Client::new(),
            settings,
            columns: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Hands the settings back, caches included, so they can be persisted.
    pub fn into_settings(self) -> Settings {
        self.settings
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub fn account(&self, alias: &str) -> Result<&Account> {
        self.settings
            .account(alias)
            .ok_or_else(|| JiraError::AccountNotFound(alias.to_string()))
    }

    fn resolve_account(&self, alias: Option<&str>) -> Result<Option<&Account>> {
        alias.map(|alias| self.account(alias)).transpose()
    }

    async fn send_with_account(
        &self,
        account: &Account,
        request: &Request<'_>,
    ) -> Result<std::result::Result<RawResponse, String>> {
        let base_path = if request.no_base_path {
            ""
        } else {
            self.settings.preferences.api_base_path.as_str()
        };
        let url = build_url(&account.host, base_path, &request.path, &request.query)?;
        let log = self.settings.preferences.log_requests_and_responses;

        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .headers(build_headers(&account.authentication));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                if log {
                    tracing::warn!(account = %account.alias, method = %request.method, %url, error = %e, "Jira request failed");
                }
                return Ok(Err(e.to_string()));
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = match response.bytes().await {
            Ok(body) => body.to_vec(),
            Err(e) => {
                if log {
                    tracing::warn!(account = %account.alias, method = %request.method, %url, status, error = %e, "Jira response body could not be read");
                }
                return Ok(Err(e.to_string()));
            }
        };

        if log {
            tracing::info!(
                account = %account.alias,
                method = %request.method,
                %url,
                status,
                body = %String::from_utf8_lossy(&body),
                "Jira request"
            );
        }

        Ok(Ok(RawResponse {
            status,
            content_type,
            body,
        }))
    }

    /// Runs the account fallback loop.
    pub(crate) async fn dispatch<'a>(&'a self, request: &Request<'a>) -> Result<Dispatch<'a>> {
        let candidates: Vec<&'a Account> = match request.account {
            Some(account) => vec![account],
            None => self.settings.accounts.iter().collect(),
        };

        if candidates.is_empty() {
            return Err(JiraError::NoAccounts);
        }

        let mut last = None;
        for account in candidates {
            let outcome = self.send_with_account(account, request).await?;
            let step = classify(outcome.as_ref().map_err(String::as_str));
            tracing::debug!(account = %account.alias, path = %request.path, ?step, "Account attempt");

            let failure = match outcome {
                Ok(response) if step == Step::Accept => {
                    return Ok(Dispatch::Success(account, response));
                }
                Ok(response) => Failure::Response(response),
                Err(msg) => Failure::Transport(msg),
            };

            if step == Step::Stop {
                return Ok(Dispatch::HardFailure(failure));
            }
            last = Some(failure);
        }

        // candidates was non-empty and every iteration either returned or set `last`
        Ok(Dispatch::Exhausted(
            last.unwrap_or_else(|| Failure::Transport("no account answered".to_string())),
        ))
    }

    /// Sends the request and turns any failure into an error.
    pub(crate) async fn send<'a>(&'a self, request: &Request<'a>) -> Result<Dispatched<'a>> {
        match self.dispatch(request).await? {
            Dispatch::Success(account, response) => Ok(Dispatched { account, response }),
            Dispatch::HardFailure(failure) | Dispatch::Exhausted(failure) => {
                let err = failure.into_error();
                if self.settings.preferences.log_requests_and_responses {
                    tracing::warn!(path = %request.path, error = %err, "Jira request error");
                }
                Err(err)
            }
        }
    }

    pub async fn get_issue(
        &self,
        key: &str,
        fields: &[String],
        account: Option<&str>,
    ) -> Result<JiraIssue> {
        let mut request = Request::get(format!("/issue/{}", urlencoding::encode(key)))
            .account(self.resolve_account(account)?);
        if !fields.is_empty() {
            request = request.query("fields", fields.join(","));
        }

        let dispatched = self.send(&request).await?;
        let mut issue: JiraIssue = dispatched.json()?;
        issue.account = Some(dispatched.account.alias.clone());
        self.fetch_issue_images(dispatched.account, &mut issue).await;

        Ok(issue)
    }

    pub async fn search(&self, jql: &str, options: &SearchOptions) -> Result<SearchResults> {
        let body = build_search_body(jql, options)?;
        let request = Request::post(SEARCH_JQL_PATH, body)
            .account(self.resolve_account(options.account.as_deref())?);

        let dispatched = self.send(&request).await?;
        let mut results: SearchResults = dispatched.json()?;
        let alias = dispatched.account.alias.clone();

        results.account = Some(alias.clone());
        for issue in results.issues.iter_mut().flatten() {
            issue.account = Some(alias.clone());
            self.fetch_issue_images(dispatched.account, issue).await;
        }

        Ok(results)
    }

    /// Follows `nextPageToken` until the last page or `max_issues` issues.
    ///
    /// Pages after the first are pinned to the account that answered the first,
    /// tokens are only valid on the instance that issued them.
    pub async fn search_all(
        &self,
        jql: &str,
        options: &SearchOptions,
        max_issues: usize,
    ) -> Result<Vec<JiraIssue>> {
        let mut options = options.clone();
        let mut issues = Vec::new();

        loop {
            let page = self.search(jql, &options).await?;
            let next = page
                .has_more()
                .then(|| page.next_page_token().map(str::to_string))
                .flatten();
            let answered_by = page.account.clone();
            issues.extend(page.into_issues());

            if issues.len() >= max_issues {
                break;
            }

            match next {
                Some(token) => {
                    options.page = super::search::PageCursor::Token(token);
                    options.account = answered_by;
                }
                None => break,
            }
        }

        issues.truncate(max_issues);
        Ok(issues)
    }

    pub async fn count(&self, jql: &str, account: Option<&str>) -> Result<u64> {
        let request = Request::post(APPROXIMATE_COUNT_PATH, json!({ "jql": jql }))
            .account(self.resolve_account(account)?);

        let count: IssueCount = self.send(&request).await?.json()?;
        Ok(count.count)
    }

    /// Succeeds when the account can list projects.
    pub async fn test_connection(&self, alias: &str) -> Result<bool> {
        let request = Request::get("/project").account(Some(self.account(alias)?));
        self.send(&request).await?;
        Ok(true)
    }

    pub async fn get_logged_user(&self, account: Option<&str>) -> Result<JiraUser> {
        let request = Request::get("/myself").account(self.resolve_account(account)?);
        self.send(&request).await?.json()
    }

    pub async fn get_dev_status(&self, issue_id: &str, account: Option<&str>) -> Result<DevStatus> {
        let request = Request::get("/rest/dev-status/latest/issue/summary")
            .query("issueId", issue_id)
            .without_base_path()
            .account(self.resolve_account(account)?);

        let dispatched = self.send(&request).await?;
        let mut status: DevStatus = dispatched.json()?;
        status.account = Some(dispatched.account.alias.clone());
        Ok(status)
    }
}
