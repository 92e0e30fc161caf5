//! Invalidation router: maps push notifications to the cache keys they
//! invalidate.
//!
//! The [`invalidates`] table is the single source of truth for push-to-cache
//! coupling; keep it exhaustive as notification types are added.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::push::Notification;
use crate::sync::{QueryCache, Resource, ResourceKey};

/// Whether `notification` invalidates the entry at `key`.
///
/// Pure and stateless: a notification hits every key sharing the named
/// resource, whatever its parameters.
pub fn invalidates(notification: Notification, key: &ResourceKey) -> bool {
  matches!(
    (notification, key.resource()),
    (Notification::BoardUpdated, Resource::Board)
      | (Notification::AgentChanged, Resource::Agents)
      | (Notification::ActivityNew, Resource::Activity)
  )
}

/// Consume notifications and translate each into one idempotent cache
/// invalidation. Runs until the sending side closes.
pub fn spawn(cache: QueryCache, mut notifications: broadcast::Receiver<Notification>) -> JoinHandle<()> {
  tokio::spawn(async move {
    loop {
      match notifications.recv().await {
        Ok(notification) => {
          debug!(%notification, "routing invalidation");
          cache.invalidate(|key| invalidates(notification, key));
        }
        Err(broadcast::error::RecvError::Lagged(missed)) => {
          // Some invalidations were dropped; refetch everything rather than
          // leave any view stale past its window.
          warn!(missed, "notification channel lagged, refreshing all entries");
          cache.refresh_all();
        }
        Err(broadcast::error::RecvError::Closed) => break,
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ApiError;
  use crate::sync::{Fetcher, QueryStatus, ResourceValue, SyncPolicy};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  fn all_keys() -> Vec<ResourceKey> {
    vec![
      ResourceKey::Projects,
      ResourceKey::Board {
        project: "all".into(),
      },
      ResourceKey::Board {
        project: "proj-1".into(),
      },
      ResourceKey::Agents,
      ResourceKey::Activity { limit: 50 },
      ResourceKey::Activity { limit: 200 },
    ]
  }

  fn invalidated(notification: Notification) -> Vec<ResourceKey> {
    all_keys()
      .into_iter()
      .filter(|key| invalidates(notification, key))
      .collect()
  }

  #[test]
  fn test_board_updated_hits_all_board_keys() {
    let keys = invalidated(Notification::BoardUpdated);
    assert_eq!(
      keys,
      vec![
        ResourceKey::Board {
          project: "all".into()
        },
        ResourceKey::Board {
          project: "proj-1".into()
        },
      ]
    );
  }

  #[test]
  fn test_agent_changed_hits_agents_only() {
    assert_eq!(invalidated(Notification::AgentChanged), vec![ResourceKey::Agents]);
  }

  #[test]
  fn test_activity_new_hits_every_activity_key() {
    assert_eq!(
      invalidated(Notification::ActivityNew),
      vec![
        ResourceKey::Activity { limit: 50 },
        ResourceKey::Activity { limit: 200 },
      ]
    );
  }

  #[test]
  fn test_projects_never_invalidated_by_push() {
    for notification in [
      Notification::BoardUpdated,
      Notification::AgentChanged,
      Notification::ActivityNew,
    ] {
      assert!(!invalidates(notification, &ResourceKey::Projects));
    }
  }

  fn counting_fetcher(count: Arc<AtomicUsize>, value: ResourceValue) -> Fetcher {
    Arc::new(move || {
      count.fetch_add(1, Ordering::SeqCst);
      let value = value.clone();
      Box::pin(async move { Ok::<_, ApiError>(value) })
    })
  }

  #[tokio::test]
  async fn test_routed_notification_refetches_matching_entries_only() {
    let cache = QueryCache::with_policy(SyncPolicy {
      stale_after: Duration::from_secs(60),
      refresh_interval: Duration::from_secs(60),
      ..SyncPolicy::default()
    });
    let (tx, rx) = broadcast::channel(16);
    let _router = spawn(cache.clone(), rx);

    let board_count = Arc::new(AtomicUsize::new(0));
    let agents_count = Arc::new(AtomicUsize::new(0));
    let board_key = ResourceKey::Board {
      project: "all".into(),
    };
    let mut board = cache.subscribe(
      board_key.clone(),
      counting_fetcher(board_count.clone(), ResourceValue::Board(Default::default())),
    );
    let agents = cache.subscribe(
      ResourceKey::Agents,
      counting_fetcher(agents_count.clone(), ResourceValue::Agents(Vec::new())),
    );

    while board.snapshot().status != QueryStatus::Idle {
      board.changed().await;
    }

    tx.send(Notification::BoardUpdated).unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
      while board_count.load(Ordering::SeqCst) < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
      }
    })
    .await
    .expect("board was never refetched");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(board_count.load(Ordering::SeqCst), 2);
    assert_eq!(agents_count.load(Ordering::SeqCst), 1);
    drop(agents);
  }
}
