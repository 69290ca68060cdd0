//! Inline images hosted on the Jira instance as `data:` URIs.

use super::auth::build_headers;
use super::jira::JiraClient;
use crate::config::settings::Account;
use crate::models::issue::JiraIssue;
use base64::Engine;
use reqwest::Url;
use serde_json::Value;

/// Image type from the first four bytes of the payload.
pub fn mime_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [0xFF, 0xD8, 0xFF, 0xDB, ..] | [0xFF, 0xD8, 0xFF, 0xE0, ..] | [0xFF, 0xD8, 0xFF, 0xE1, ..] => {
            Some("image/jpeg")
        }
        // "<svg" and "<?xm"
        [0x3C, 0x73, 0x76, 0x67, ..] | [0x3C, 0x3F, 0x78, 0x6D, ..] => Some("image/svg+xml"),
        _ => None,
    }
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Same scheme, host and port as the account, and under its context path.
fn is_same_instance(account: &Account, url: &str) -> bool {
    let (instance, target) = match (Url::parse(&account.host), Url::parse(url)) {
        (Ok(instance), Ok(target)) => (instance, target),
        _ => return false,
    };

    let same_origin = instance.scheme() == target.scheme()
        && instance.host_str().is_some()
        && instance.host_str() == target.host_str()
        && instance.port_or_known_default() == target.port_or_known_default();

    let prefix = instance.path().trim_end_matches('/');
    let path = target.path();
    let under_prefix = prefix.is_empty()
        || path == prefix
        || path
            .strip_prefix(prefix)
            .map_or(false, |rest| rest.starts_with('/'));

    same_origin && under_prefix
}

impl JiraClient {
    /// `Some(url)` untouched for foreign hosts, `Some(data uri)` when fetched,
    /// `None` when the fetch failed or the payload is not a known image.
    pub async fn prefetch_image(&self, account: &Account, url: &str) -> Option<String> {
        if !is_same_instance(account, url) {
            return Some(url.to_string());
        }

        let log = self.settings().preferences.log_images_fetch;

        let response = self
            .http()
            .get(url)
            .headers(build_headers(&account.authentication))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                if log {
                    tracing::warn!(account = %account.alias, %url, error = %e, "Image fetch failed");
                }
                return None;
            }
        };

        let status = response.status();
        if log {
            tracing::info!(account = %account.alias, %url, status = status.as_u16(), "Image fetch");
        }
        if status.as_u16() != 200 {
            return None;
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                if log {
                    tracing::warn!(account = %account.alias, %url, error = %e, "Image download failed");
                }
                return None;
            }
        };

        match mime_type(&bytes) {
            Some(mime) => Some(data_uri(mime, &bytes)),
            None => {
                if log {
                    let signature: String = bytes.iter().take(4).map(|b| format!("{:02X}", b)).collect();
                    tracing::error!(%url, %signature, "Image mime type not found");
                }
                None
            }
        }
    }

    /// Replaces issue type, priority and people images with inlined versions, one at a time.
    pub async fn fetch_issue_images(&self, account: &Account, issue: &mut JiraIssue) {
        let targets: [&[&str]; 4] = [
            &["issuetype", "iconUrl"],
            &["reporter", "avatarUrls", "16x16"],
            &["assignee", "avatarUrls", "16x16"],
            &["priority", "iconUrl"],
        ];

        for path in targets {
            let url = match issue.fields_mut().and_then(|fields| image_slot(fields, path)) {
                Some(Value::String(url)) => url.clone(),
                _ => continue,
            };

            let inlined = self.prefetch_image(account, &url).await;

            if let Some(slot) = issue.fields_mut().and_then(|fields| image_slot(fields, path)) {
                *slot = inlined.map(Value::String).unwrap_or(Value::Null);
            }
        }
    }
}

fn image_slot<'v>(
    fields: &'v mut serde_json::Map<String, Value>,
    path: &[&str],
) -> Option<&'v mut Value> {
    let (first, rest) = path.split_first()?;
    let mut value = fields.get_mut(*first)?;
    for key in rest {
        value = value.get_mut(*key)?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{AccountCache, Authentication, Settings};
    use serde_json::json;

    const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn account(host: &str) -> Account {
        Account {
            alias: "main".to_string(),
            host: host.to_string(),
            authentication: Authentication::BearerToken {
                token: "secret".to_string(),
            },
            priority: 0,
            color: None,
            cache: AccountCache::default(),
        }
    }

    fn client(host: &str) -> JiraClient {
        JiraClient::new(Settings {
            accounts: vec![account(host)],
            ..Default::default()
        })
    }

    #[test]
    fn test_mime_type_signatures() {
        assert_eq!(mime_type(&[0x89, 0x50, 0x4E, 0x47]), Some("image/png"));
        assert_eq!(mime_type(&[0x47, 0x49, 0x46, 0x38]), Some("image/gif"));
        assert_eq!(mime_type(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), Some("image/jpeg"));
        assert_eq!(mime_type(&[0xFF, 0xD8, 0xFF, 0xDB]), Some("image/jpeg"));
        assert_eq!(mime_type(&[0xFF, 0xD8, 0xFF, 0xE1]), Some("image/jpeg"));
        assert_eq!(mime_type(b"<svg xmlns"), Some("image/svg+xml"));
        assert_eq!(mime_type(b"<?xml version"), Some("image/svg+xml"));
        assert_eq!(mime_type(&[0x00, 0x01, 0x02, 0x03]), None);
        assert_eq!(mime_type(&[0x89, 0x50]), None);
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(data_uri("image/gif", b"GIF8"), "data:image/gif;base64,R0lGOA==");
    }

    #[test]
    fn test_same_instance_compares_origin() {
        let acct = account("https://jira.example.com/");
        assert!(is_same_instance(&acct, "https://jira.example.com/images/bug.png"));
        assert!(is_same_instance(&acct, "https://JIRA.example.com:443/images/bug.png"));
        assert!(!is_same_instance(&acct, "https://jira.example.com.attacker.net/avatar.png"));
        assert!(!is_same_instance(&acct, "https://jira.example.com@attacker.net/avatar.png"));
        assert!(!is_same_instance(&acct, "http://jira.example.com/images/bug.png"));
        assert!(!is_same_instance(&acct, "https://jira.example.com:8443/images/bug.png"));
        assert!(!is_same_instance(&acct, "not a url"));
    }

    #[test]
    fn test_same_instance_respects_context_path() {
        let acct = account("https://example.com/jira");
        assert!(is_same_instance(&acct, "https://example.com/jira/images/bug.png"));
        assert!(!is_same_instance(&acct, "https://example.com/jira-evil/avatar.png"));
        assert!(!is_same_instance(&acct, "https://example.com/other/avatar.png"));
    }

    #[tokio::test]
    async fn test_lookalike_host_is_not_fetched() {
        let client = client("https://jira.example.com");
        let acct = account("https://jira.example.com");
        let url = "https://jira.example.com.attacker.net/avatar.png";
        assert_eq!(client.prefetch_image(&acct, url).await, Some(url.to_string()));
    }

    #[tokio::test]
    async fn test_foreign_host_is_left_alone() {
        let client = client("https://jira.example.com");
        let acct = account("https://jira.example.com");
        let url = "https://secure.gravatar.com/avatar/abc.png";
        assert_eq!(client.prefetch_image(&acct, url).await, Some(url.to_string()));
    }

    #[tokio::test]
    async fn test_same_host_image_is_inlined() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/images/icons/bug.png")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(PNG)
            .create_async()
            .await;

        let client = client(&server.url());
        let acct = account(&server.url());
        let url = format!("{}/images/icons/bug.png", server.url());

        let inlined = client.prefetch_image(&acct, &url).await.unwrap();
        assert_eq!(inlined, data_uri("image/png", &PNG));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_payload_yields_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/avatar")
            .with_status(200)
            .with_body("not an image")
            .create_async()
            .await;

        let client = client(&server.url());
        let acct = account(&server.url());
        let url = format!("{}/avatar", server.url());
        assert_eq!(client.prefetch_image(&acct, &url).await, None);
    }

    #[tokio::test]
    async fn test_issue_images_replaced_in_place() {
        let mut server = mockito::Server::new_async().await;
        let _icon = server
            .mock("GET", "/icons/story.gif")
            .with_status(200)
            .with_body(b"GIF89a")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/avatars/reporter")
            .with_status(404)
            .create_async()
            .await;

        let client = client(&server.url());
        let acct = account(&server.url());
        let mut issue: JiraIssue = serde_json::from_value(json!({
            "key": "TEST-1",
            "fields": {
                "issuetype": { "name": "Story", "iconUrl": format!("{}/icons/story.gif", server.url()) },
                "reporter": { "avatarUrls": { "16x16": format!("{}/avatars/reporter", server.url()) } },
                "assignee": { "avatarUrls": { "16x16": "https://cdn.example.org/a.png" } },
                "priority": null
            }
        }))
        .unwrap();

        client.fetch_issue_images(&acct, &mut issue).await;

        assert_eq!(
            issue.extra["fields"]["issuetype"]["iconUrl"],
            json!(data_uri("image/gif", b"GIF89a"))
        );
        assert_eq!(issue.extra["fields"]["reporter"]["avatarUrls"]["16x16"], Value::Null);
        assert_eq!(
            issue.extra["fields"]["assignee"]["avatarUrls"]["16x16"],
            json!("https://cdn.example.org/a.png")
        );
        assert_eq!(issue.extra["fields"]["priority"], Value::Null);
    }
}
