//! Request authentication headers

use crate::config::settings::Authentication;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

/// Jira rejects state-changing requests without it (XSRF check).
pub const XSRF_HEADER: &str = "X-Atlassian-Token";
pub const XSRF_VALUE: &str = "no-check";

impl Authentication {
    pub fn to_authorization(&self) -> String {
        match self {
            Authentication::Basic { username, password } => basic(username, password),
            Authentication::Cloud { username, api_token } => basic(username, api_token),
            Authentication::BearerToken { token } => format!("Bearer {}", token),
        }
    }
}

fn basic(username: &str, secret: &str) -> String {
    let credentials = format!("{}:{}", username, secret);
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(credentials)
    )
}

pub fn build_headers(auth: &Authentication) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(XSRF_HEADER, HeaderValue::from_static(XSRF_VALUE));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    // A credential with control characters cannot be sent; the server answers 401.
    if let Ok(mut value) = HeaderValue::from_str(&auth.to_authorization()) {
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_and_cloud_share_encoding() {
        let basic = Authentication::Basic {
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        let cloud = Authentication::Cloud {
            username: "user".to_string(),
            api_token: "pass".to_string(),
        };
        assert_eq!(basic.to_authorization(), "Basic dXNlcjpwYXNz");
        assert_eq!(cloud.to_authorization(), basic.to_authorization());
    }

    #[test]
    fn test_bearer_token() {
        let auth = Authentication::BearerToken {
            token: "pat-123".to_string(),
        };
        assert_eq!(auth.to_authorization(), "Bearer pat-123");
    }

    #[test]
    fn test_xsrf_header_always_present() {
        let headers = build_headers(&Authentication::BearerToken {
            token: "t".to_string(),
        });
        assert_eq!(headers.get(XSRF_HEADER).unwrap(), "no-check");
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
    }
}
