//! Resource identities and values for the query cache.

use std::fmt;

use crate::api::types::{ActivityEvent, Agent, BoardData, Project};

/// Identity of a cacheable dataset: resource name plus its parameters.
///
/// Two keys are equal iff the name and every parameter are equal, so the
/// derived `Eq`/`Hash` are exactly the cache-key semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
  /// All projects.
  Projects,
  /// Board columns, filtered to a project id or `"all"`.
  Board { project: String },
  /// Active agents.
  Agents,
  /// Recent activity, newest first.
  Activity { limit: u32 },
}

impl ResourceKey {
  /// The bare resource name, used by invalidation routing.
  pub fn resource(&self) -> Resource {
    match self {
      Self::Projects => Resource::Projects,
      Self::Board { .. } => Resource::Board,
      Self::Agents => Resource::Agents,
      Self::Activity { .. } => Resource::Activity,
    }
  }
}

impl fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Projects => write!(f, "projects"),
      Self::Board { project } => write!(f, "board[{}]", project),
      Self::Agents => write!(f, "agents"),
      Self::Activity { limit } => write!(f, "activity[{}]", limit),
    }
  }
}

/// Resource names, without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
  Projects,
  Board,
  Agents,
  Activity,
}

/// The last-known value of a cache entry. Each variant owns the payload of
/// the matching `ResourceKey` variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceValue {
  Projects(Vec<Project>),
  Board(BoardData),
  Agents(Vec<Agent>),
  Activity(Vec<ActivityEvent>),
}

impl ResourceValue {
  pub fn as_projects(&self) -> Option<&[Project]> {
    match self {
      Self::Projects(projects) => Some(projects),
      _ => None,
    }
  }

  pub fn as_board(&self) -> Option<&BoardData> {
    match self {
      Self::Board(board) => Some(board),
      _ => None,
    }
  }

  pub fn as_agents(&self) -> Option<&[Agent]> {
    match self {
      Self::Agents(agents) => Some(agents),
      _ => None,
    }
  }

  pub fn as_activity(&self) -> Option<&[ActivityEvent]> {
    match self {
      Self::Activity(events) => Some(events),
      _ => None,
    }
  }
}
