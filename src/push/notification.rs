//! The closed set of change notifications delivered over the push channel.

use std::fmt;

/// A payload-less signal that some server-side resource changed.
///
/// Notifications are pure invalidation triggers: they never carry the new
/// data, only which resource to refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
  BoardUpdated,
  AgentChanged,
  ActivityNew,
}

impl Notification {
  /// Decode an SSE event name. Unknown or absent names yield `None` and are
  /// silently dropped, so newer backends can add event types without
  /// breaking older clients.
  pub fn parse(event: Option<&str>) -> Option<Self> {
    match event? {
      "board_updated" => Some(Self::BoardUpdated),
      "agent_changed" => Some(Self::AgentChanged),
      "activity_new" => Some(Self::ActivityNew),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::BoardUpdated => "board_updated",
      Self::AgentChanged => "agent_changed",
      Self::ActivityNew => "activity_new",
    }
  }
}

impl fmt::Display for Notification {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
