//! Request description, URL building and status-to-error mapping.

use crate::config::settings::Account;
use crate::errors::{JiraError, Result};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// One logical call to Jira. Without an explicit account it is routed
/// through every configured account in priority order.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    pub method: Method,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<Value>,
    pub account: Option<&'a Account>,
    /// Path is absolute (agile, dev-status), skip the REST api base path.
    pub no_base_path: bool,
}

impl<'a> Request<'a> {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
            account: None,
            no_base_path: false,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::get(path)
        }
    }

    pub fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn account(mut self, account: Option<&'a Account>) -> Self {
        self.account = account;
        self
    }

    pub fn without_base_path(mut self) -> Self {
        self.no_base_path = true;
        self
    }
}

/// What came back from a single account.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Only a 200 is accepted; other 2xx carry no body to decode.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("json"))
            .unwrap_or(false)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Why an account attempt did not succeed.
#[derive(Debug, Clone)]
pub enum Failure {
    Response(RawResponse),
    Transport(String),
}

impl Failure {
    pub fn into_error(self) -> JiraError {
        match self {
            Failure::Response(response) => error_from_response(&response),
            Failure::Transport(msg) => JiraError::Network(msg),
        }
    }
}

/// Routing decision after one account answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Accept,
    /// Account-specific rejection (4xx), the next account may do better.
    Next,
    /// Systemic failure, remaining accounts are not tried.
    Stop,
}

pub fn classify(outcome: std::result::Result<&RawResponse, &str>) -> Step {
    match outcome {
        Ok(response) if response.is_success() => Step::Accept,
        Ok(response) if response.status / 100 == 4 => Step::Next,
        _ => Step::Stop,
    }
}

/// Final state of the account fallback loop.
#[derive(Debug)]
pub enum Dispatch<'a> {
    Success(&'a Account, RawResponse),
    HardFailure(Failure),
    Exhausted(Failure),
}

/// `host` + `base_path` + `path` with exactly one slash between the parts.
pub fn build_url(host: &str, base_path: &str, path: &str, query: &[(&str, String)]) -> Result<Url> {
    let mut joined = host.trim_end_matches('/').to_string();
    for part in [base_path, path] {
        let part = part.trim_matches('/');
        if !part.is_empty() {
            joined.push('/');
            joined.push_str(part);
        }
    }

    let mut url = Url::parse(&joined)
        .map_err(|e| JiraError::Config(format!("Invalid URL '{}': {}", joined, e)))?;

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
    }

    Ok(url)
}

pub fn error_from_response(response: &RawResponse) -> JiraError {
    let status = response.status;
    let payload: Option<Value> = if response.is_json() {
        serde_json::from_slice(&response.body).ok()
    } else {
        None
    };

    let error_messages = payload
        .as_ref()
        .and_then(|p| p.get("errorMessages"))
        .and_then(Value::as_array)
        .map(|messages| {
            messages
                .iter()
                .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                .collect::<Vec<_>>()
        })
        .filter(|messages| !messages.is_empty());

    let message = match (error_messages, status) {
        (Some(messages), _) => messages.join("\n"),
        (None, 400) => "Bad Request: The query is not valid".to_string(),
        (None, 401) => "Unauthorized: Please check your authentication credentials".to_string(),
        (None, 404) => "Not Found: Issue does not exist".to_string(),
        (None, _) => {
            let detail = payload
                .as_ref()
                .and_then(|p| p.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status));
            format!("Jira API {} Error: {}", status, detail)
        }
    };

    JiraError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, content_type: Option<&str>, body: Value) -> RawResponse {
        RawResponse {
            status,
            content_type: content_type.map(str::to_string),
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    #[test]
    fn test_build_url_avoids_duplicate_slashes() {
        let url = build_url("https://jira.example.com/", "/rest/api/3/", "/issue/TEST-1", &[]).unwrap();
        assert_eq!(url.as_str(), "https://jira.example.com/rest/api/3/issue/TEST-1");
    }

    #[test]
    fn test_build_url_without_base_path() {
        let url = build_url(
            "https://jira.example.com",
            "",
            "/rest/agile/1.0/board",
            &[("projectKeyOrId", "TEST".to_string()), ("startAt", "0".to_string())],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://jira.example.com/rest/agile/1.0/board?projectKeyOrId=TEST&startAt=0"
        );
    }

    #[test]
    fn test_build_url_keeps_host_context_path() {
        let url = build_url("https://example.com/jira", "rest/api/3", "myself", &[]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/jira/rest/api/3/myself");
    }

    #[test]
    fn test_build_url_rejects_garbage_host() {
        assert!(matches!(
            build_url("not a url", "/rest/api/3", "/myself", &[]),
            Err(JiraError::Config(_))
        ));
    }

    #[test]
    fn test_error_messages_are_newline_joined() {
        let resp = response(
            400,
            Some("application/json;charset=UTF-8"),
            json!({ "errorMessages": ["Field 'foo' does not exist.", "Bad JQL"], "errors": {} }),
        );
        let err = error_from_response(&resp);
        assert_eq!(err.to_string(), "Field 'foo' does not exist.\nBad JQL");
    }

    #[test]
    fn test_error_messages_ignored_without_json_content_type() {
        let resp = response(400, Some("text/html"), json!({ "errorMessages": ["hidden"] }));
        assert_eq!(error_from_response(&resp).to_string(), "Bad Request: The query is not valid");
    }

    #[test]
    fn test_known_statuses() {
        let unauthorized = response(401, None, json!({}));
        assert_eq!(
            error_from_response(&unauthorized).to_string(),
            "Unauthorized: Please check your authentication credentials"
        );

        let not_found = response(404, Some("application/json"), json!({ "errorMessages": [] }));
        assert_eq!(error_from_response(&not_found).to_string(), "Not Found: Issue does not exist");
    }

    #[test]
    fn test_unknown_status_without_message() {
        let resp = response(418, Some("application/json"), json!({}));
        assert_eq!(error_from_response(&resp).to_string(), "Jira API 418 Error: HTTP 418");
    }

    #[test]
    fn test_unknown_status_with_message() {
        let resp = response(503, Some("application/json"), json!({ "message": "Down for maintenance" }));
        assert_eq!(
            error_from_response(&resp).to_string(),
            "Jira API 503 Error: Down for maintenance"
        );
    }

    #[test]
    fn test_no_content_is_an_error() {
        let resp = RawResponse {
            status: 204,
            content_type: None,
            body: Vec::new(),
        };
        assert!(!resp.is_success());
        assert_eq!(error_from_response(&resp).to_string(), "Jira API 204 Error: HTTP 204");
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(Ok(&response(200, None, json!({})))), Step::Accept);
        assert_eq!(classify(Ok(&response(403, None, json!({})))), Step::Next);
        assert_eq!(classify(Ok(&response(404, None, json!({})))), Step::Next);
        assert_eq!(classify(Ok(&response(500, None, json!({})))), Step::Stop);
        assert_eq!(classify(Ok(&response(302, None, json!({})))), Step::Stop);
        assert_eq!(classify(Ok(&response(204, None, json!({})))), Step::Stop);
        assert_eq!(classify(Err("connection refused")), Step::Stop);
    }
}
