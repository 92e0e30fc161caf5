//! Serde-deserializable types matching Mimir API responses.
//!
//! Timestamps stay as the ISO-8601 strings the backend emits; the sync layer
//! never interprets them, only hands them to consumers.

use serde::{Deserialize, Serialize};

/// Project from `/api/projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
  pub id: String,
  pub name: String,
  pub path: String,
  pub branch_name: String,
  pub description: String,
  pub total_stories: Option<i64>,
  pub done_stories: Option<i64>,
  pub last_synced: Option<String>,
}

/// Task appearing in board columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  pub id: String,
  pub project_id: String,
  pub project_name: String,
  pub story_id: String,
  pub title: String,
  pub description: String,
  pub status: String,
  pub domain: String,
  pub complexity: String,
  pub blocked_reason: Option<String>,
  pub assigned_agent: Option<String>,
  pub priority: i64,
  pub updated_at: String,
}

/// Column buckets of the board response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardColumns {
  #[serde(default)]
  pub backlog: Vec<Task>,
  #[serde(default)]
  pub in_progress: Vec<Task>,
  #[serde(default)]
  pub blocked: Vec<Task>,
  #[serde(default)]
  pub done: Vec<Task>,
}

/// Board response from `/api/board`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardData {
  pub columns: BoardColumns,
  pub total: i64,
  pub done_count: i64,
}

/// Agent from `/api/agents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
  pub name: String,
  pub project_id: String,
  pub project_name: String,
  pub story_id: String,
  pub current_task: String,
  pub since: String,
}

/// Activity event from `/api/activity`, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
  pub id: Option<i64>,
  pub project_id: String,
  pub project_name: String,
  pub event_type: String,
  pub story_id: String,
  pub agent_name: Option<String>,
  pub summary: String,
  pub timestamp: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_project_tolerates_null_story_counts() {
    let project: Project = serde_json::from_str(
      r#"{
        "id": "proj-1",
        "name": "mimir",
        "path": "/srv/mimir",
        "branch_name": "main",
        "description": "",
        "total_stories": null,
        "done_stories": null,
        "last_synced": null
      }"#,
    )
    .unwrap();
    assert!(project.total_stories.is_none());
    assert!(project.last_synced.is_none());
  }

  #[test]
  fn test_activity_event_id_is_optional() {
    let event: ActivityEvent = serde_json::from_str(
      r#"{
        "project_id": "proj-1",
        "project_name": "mimir",
        "event_type": "story_done",
        "story_id": "S-12",
        "agent_name": null,
        "summary": "story S-12 completed",
        "timestamp": "2026-08-01T10:00:00"
      }"#,
    )
    .unwrap();
    assert!(event.id.is_none());
    assert!(event.agent_name.is_none());
  }

  #[test]
  fn test_board_defaults_missing_columns() {
    let board: BoardData = serde_json::from_str(
      r#"{"columns": {"backlog": [], "done": []}, "total": 0, "done_count": 0}"#,
    )
    .unwrap();
    assert!(board.columns.in_progress.is_empty());
    assert!(board.columns.blocked.is_empty());
  }
}
