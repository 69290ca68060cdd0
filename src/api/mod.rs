pub mod agile;
pub mod auth;
pub mod cache;
pub mod images;
pub mod jira;
pub mod request;
pub mod search;

pub use jira::JiraClient;
pub use search::{PageCursor, SearchOptions};
