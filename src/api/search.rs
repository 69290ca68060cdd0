//! JQL search request construction.

use crate::errors::Result;
use serde::Serialize;
use serde_json::Value;

pub const SEARCH_JQL_PATH: &str = "/search/jql";
pub const APPROXIMATE_COUNT_PATH: &str = "/search/approximate-count";
pub const DEFAULT_MAX_RESULTS: i64 = 50;

/// Where a search page starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageCursor {
    #[default]
    First,
    /// Opaque `nextPageToken` from a previous page.
    Token(String),
    /// Legacy numeric offset.
    Offset(u32),
}

impl PageCursor {
    /// Accepts both legacy and token callers; the token wins when both are given.
    pub fn from_parts(token: Option<String>, offset: Option<u32>) -> Self {
        match (token, offset) {
            (Some(token), _) if !token.is_empty() => PageCursor::Token(token),
            (_, Some(offset)) if offset > 0 => PageCursor::Offset(offset),
            _ => PageCursor::First,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub fields: Vec<String>,
    pub limit: Option<i64>,
    pub page: PageCursor,
    /// Alias of the account to query; all accounts are tried when unset.
    pub account: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    jql: &'a str,
    #[serde(skip_serializing_if = "no_fields")]
    fields: &'a [String],
    max_results: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_at: Option<StartAt<'a>>,
}

fn no_fields(fields: &&[String]) -> bool {
    fields.is_empty()
}

/// The endpoint accepts either a token or an offset under the same key.
#[derive(Serialize)]
#[serde(untagged)]
enum StartAt<'a> {
    Token(&'a str),
    Offset(u32),
}

pub fn max_results(limit: Option<i64>) -> i64 {
    match limit {
        Some(limit) if limit > 0 => limit,
        _ => DEFAULT_MAX_RESULTS,
    }
}

pub fn build_search_body(jql: &str, options: &SearchOptions) -> Result<Value> {
    let start_at = match &options.page {
        PageCursor::Token(token) => Some(StartAt::Token(token)),
        PageCursor::Offset(offset) if *offset > 0 => Some(StartAt::Offset(*offset)),
        _ => None,
    };

    let body = SearchBody {
        jql,
        fields: &options.fields,
        max_results: max_results(options.limit),
        start_at,
    };

    Ok(serde_json::to_value(body)?)
}
