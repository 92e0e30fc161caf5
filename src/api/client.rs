//! Typed client for the four Mimir read endpoints.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::ApiError;
use crate::sync::{Fetcher, ResourceKey, ResourceValue};

use super::types::{ActivityEvent, Agent, BoardData, Project};

/// Mimir API client wrapper.
///
/// Stateless by design: every method is a single GET that either yields a
/// decoded value or an `ApiError`. Retry and staleness policy live in the
/// query cache, not here.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
}

impl ApiClient {
  pub fn new(base: Url) -> Result<Self, ApiError> {
    let http = reqwest::Client::builder().build()?;
    Ok(Self { http, base })
  }

  /// Base URL this client talks to (also the push channel origin).
  pub fn base_url(&self) -> &Url {
    &self.base
  }

  /// List all projects.
  pub async fn get_projects(&self) -> Result<Vec<Project>, ApiError> {
    self.get_json("/api/projects", &[]).await
  }

  /// Get the board columns, filtered to a project id or `"all"`.
  pub async fn get_board(&self, project: &str) -> Result<BoardData, ApiError> {
    self
      .get_json("/api/board", &[("project", project.to_string())])
      .await
  }

  /// List active agents.
  pub async fn get_agents(&self) -> Result<Vec<Agent>, ApiError> {
    self.get_json("/api/agents", &[]).await
  }

  /// Get recent activity, newest first. `after` is an ISO timestamp cursor
  /// for pagination; the cache always fetches without one.
  pub async fn get_activity(
    &self,
    limit: u32,
    after: Option<&str>,
  ) -> Result<Vec<ActivityEvent>, ApiError> {
    let mut params = vec![("limit", limit.to_string())];
    if let Some(after) = after {
      params.push(("after", after.to_string()));
    }
    self.get_json("/api/activity", &params).await
  }

  /// Build the fetch closure for a resource key, for handing to
  /// `QueryCache::subscribe`.
  pub fn fetcher(&self, key: &ResourceKey) -> Fetcher {
    let api = self.clone();
    match key.clone() {
      ResourceKey::Projects => Arc::new(move || {
        let api = api.clone();
        Box::pin(async move { api.get_projects().await.map(ResourceValue::Projects) })
      }),
      ResourceKey::Board { project } => Arc::new(move || {
        let api = api.clone();
        let project = project.clone();
        Box::pin(async move { api.get_board(&project).await.map(ResourceValue::Board) })
      }),
      ResourceKey::Agents => Arc::new(move || {
        let api = api.clone();
        Box::pin(async move { api.get_agents().await.map(ResourceValue::Agents) })
      }),
      ResourceKey::Activity { limit } => Arc::new(move || {
        let api = api.clone();
        Box::pin(async move {
          api
            .get_activity(limit, None)
            .await
            .map(ResourceValue::Activity)
        })
      }),
    }
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    params: &[(&str, String)],
  ) -> Result<T, ApiError> {
    let mut url = self.base.join(path)?;
    if !params.is_empty() {
      url
        .query_pairs_mut()
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
    }

    let response = self.http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(ApiError::Status {
        status: status.as_u16(),
        endpoint: path.to_string(),
      });
    }

    Ok(response.json().await?)
  }
}
