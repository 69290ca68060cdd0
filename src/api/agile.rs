//! Boards and sprints from the Jira Software agile API.

use super::jira::JiraClient;
use super::request::Request;
use crate::errors::Result;
use crate::models::agile::{Board, Paged, Sprint, SprintState};

const AGILE_BASE: &str = "/rest/agile/1.0";

#[derive(Debug, Clone, Default)]
pub struct SprintQuery {
    pub limit: Option<u32>,
    pub offset: u32,
    pub states: Vec<SprintState>,
    pub account: Option<String>,
}

impl JiraClient {
    pub async fn get_boards(
        &self,
        project_key_or_id: &str,
        limit: Option<u32>,
        account: Option<&str>,
    ) -> Result<Vec<Board>> {
        let account = account.map(|alias| self.account(alias)).transpose()?;
        let mut request = Request::get(format!("{}/board", AGILE_BASE))
            .query("projectKeyOrId", project_key_or_id)
            .query("startAt", "0")
            .without_base_path()
            .account(account);
        if let Some(limit) = limit {
            request = request.query("maxResults", limit.to_string());
        }

        let boards: Paged<Board> = self.send(&request).await?.json()?;
        Ok(boards.values)
    }

    pub async fn get_sprint(&self, sprint_id: u64, account: Option<&str>) -> Result<Sprint> {
        let account = account.map(|alias| self.account(alias)).transpose()?;
        let request = Request::get(format!("{}/sprint/{}", AGILE_BASE, sprint_id))
            .without_base_path()
            .account(account);

        self.send(&request).await?.json()
    }

    pub async fn get_sprints(&self, board_id: u64, query: &SprintQuery) -> Result<Vec<Sprint>> {
        let account = query
            .account
            .as_deref()
            .map(|alias| self.account(alias))
            .transpose()?;
        let states = query
            .states
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut request = Request::get(format!("{}/board/{}/sprint", AGILE_BASE, board_id))
            .query("startAt", query.offset.to_string())
            .without_base_path()
            .account(account);
        if !states.is_empty() {
            request = request.query("state", states);
        }
        if let Some(limit) = query.limit {
            request = request.query("maxResults", limit.to_string());
        }

        let sprints: Paged<Sprint> = self.send(&request).await?.json()?;
        Ok(sprints.values)
    }

    /// First active sprint of the board, if any.
    pub async fn get_latest_sprint(
        &self,
        board_id: u64,
        account: Option<&str>,
    ) -> Result<Option<Sprint>> {
        let query = SprintQuery {
            states: vec![SprintState::Active],
            account: account.map(str::to_string),
            ..Default::default()
        };
        let sprints = self.get_sprints(board_id, &query).await?;
        Ok(sprints.into_iter().next())
    }
}
