//! Jira REST client rendering issues, searches and counts inline.
//!
//! Requests are routed through every configured account in priority order;
//! see [`api::JiraClient`].

pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod render;

pub use api::{JiraClient, PageCursor, SearchOptions};
pub use errors::{JiraError, Result};
