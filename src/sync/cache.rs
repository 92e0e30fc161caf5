//! Synchronized query cache: subscriptions, staleness, and refetch scheduling.
//!
//! Inspired by TanStack Query, this module keeps one cache entry per
//! [`ResourceKey`] and owns the entire freshness policy: a fixed refetch
//! interval as a freshness floor, push-driven invalidation, bounded retries,
//! and stale-while-revalidate serving.
//!
//! # Example
//!
//! ```ignore
//! let cache = QueryCache::new();
//! let key = ResourceKey::Board { project: "all".into() };
//! let mut sub = cache.subscribe(key.clone(), api.fetcher(&key));
//!
//! // Serve whatever is known right now
//! let snapshot = sub.snapshot();
//!
//! // React to changes
//! let snapshot = sub.changed().await;
//! ```

use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::error::ApiError;

use super::resource::{ResourceKey, ResourceValue};

/// Result of a single fetch attempt.
pub type FetchResult = Result<ResourceValue, ApiError>;

/// A boxed future that resolves to a fetch result.
type BoxFetchFuture = Pin<Box<dyn Future<Output = FetchResult> + Send>>;

/// A factory function that creates futures for fetching a resource.
pub type Fetcher = Arc<dyn Fn() -> BoxFetchFuture + Send + Sync>;

/// Observable state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// Not fetching; the value (if any) is the last successful one.
  Idle,
  /// First fetch for this entry is in flight; no value yet.
  Fetching,
  /// Refetching while a previous value is still being served.
  StaleFetching,
  /// The most recent fetch failed after retries; a prior value may remain.
  Error,
}

/// What a consumer sees for one resource key.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
  /// Last successful value, if any fetch ever succeeded.
  pub value: Option<ResourceValue>,
  pub status: QueryStatus,
  /// Message from the last failed fetch, cleared on success.
  pub last_error: Option<String>,
  /// Wall-clock time of the last successful fetch.
  pub fetched_at: Option<DateTime<Utc>>,
}

impl QuerySnapshot {
  pub fn is_loading(&self) -> bool {
    matches!(
      self.status,
      QueryStatus::Fetching | QueryStatus::StaleFetching
    )
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }
}

impl Default for QuerySnapshot {
  fn default() -> Self {
    Self {
      value: None,
      status: QueryStatus::Idle,
      last_error: None,
      fetched_at: None,
    }
  }
}

/// Tunable freshness policy. Defaults are the production values.
#[derive(Debug, Clone, Copy)]
pub struct SyncPolicy {
  /// Age after which a cached value is considered stale absent invalidation.
  pub stale_after: Duration,
  /// Fixed refetch interval for subscribed entries (freshness floor).
  pub refresh_interval: Duration,
  /// Bound on a single fetch attempt; exceeding it counts as a failure.
  pub fetch_timeout: Duration,
  /// Additional attempts after a failed fetch.
  pub retry_limit: u32,
  /// Pause between retry attempts.
  pub retry_delay: Duration,
}

impl Default for SyncPolicy {
  fn default() -> Self {
    Self {
      stale_after: Duration::from_secs(30),
      refresh_interval: Duration::from_secs(30),
      fetch_timeout: Duration::from_secs(10),
      retry_limit: 2,
      retry_delay: Duration::from_millis(250),
    }
  }
}

/// One cache entry, owned exclusively by the cache.
struct CacheEntry {
  /// Single source of truth for the consumer-visible snapshot.
  tx: watch::Sender<QuerySnapshot>,
  /// Monotonic time of the last successful fetch, for staleness arithmetic.
  fetched_at: Option<Instant>,
  /// Marked by invalidation; cleared on the next successful fetch.
  stale: bool,
  subscribers: usize,
  in_flight: bool,
  /// An invalidation or timer tick arrived mid-fetch; run once more after.
  rerun: bool,
  /// Bumped at every fetch issue; results from older issues are discarded.
  epoch: u64,
  fetcher: Fetcher,
  /// Freshness-floor timer, running only while subscribers > 0.
  refresh: Option<JoinHandle<()>>,
}

impl CacheEntry {
  fn new(fetcher: Fetcher) -> Self {
    let (tx, _rx) = watch::channel(QuerySnapshot::default());
    Self {
      tx,
      fetched_at: None,
      stale: false,
      subscribers: 0,
      in_flight: false,
      rerun: false,
      epoch: 0,
      fetcher,
      refresh: None,
    }
  }

  /// Stale means: explicitly invalidated, never fetched, or past the window.
  fn is_stale(&self, stale_after: Duration) -> bool {
    self.stale
      || self
        .fetched_at
        .map(|t| t.elapsed() >= stale_after)
        .unwrap_or(true)
  }
}

struct CacheInner {
  entries: Mutex<HashMap<ResourceKey, CacheEntry>>,
  policy: SyncPolicy,
}

/// Process-wide registry of cache entries keyed by [`ResourceKey`].
///
/// The cache is the single writer of entry state: push notifications and
/// interval timers both funnel through `invalidate`/internal refetch paths.
/// All bookkeeping is synchronous; only the fetches themselves suspend.
#[derive(Clone)]
pub struct QueryCache {
  inner: Arc<CacheInner>,
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::new()
  }
}

impl QueryCache {
  pub fn new() -> Self {
    Self::with_policy(SyncPolicy::default())
  }

  pub fn with_policy(policy: SyncPolicy) -> Self {
    Self {
      inner: Arc::new(CacheInner {
        entries: Mutex::new(HashMap::new()),
        policy,
      }),
    }
  }

  /// Subscribe to a resource key.
  ///
  /// The first subscription for a key triggers an immediate fetch. A
  /// subscription to an already-cached key serves the cached value
  /// synchronously and refetches in the background only if the entry is
  /// stale. The subscription unsubscribes on drop.
  pub fn subscribe(&self, key: ResourceKey, fetcher: Fetcher) -> Subscription {
    let every = self.inner.policy.refresh_interval;
    let mut entries = self.entries();

    let rx = match entries.entry(key.clone()) {
      MapEntry::Vacant(slot) => {
        debug!(key = %key, "creating cache entry");
        let entry = slot.insert(CacheEntry::new(fetcher));
        entry.subscribers = 1;
        let rx = entry.tx.subscribe();
        self.issue_fetch(&key, entry);
        entry.refresh = Some(self.spawn_refresh(&key, every));
        rx
      }
      MapEntry::Occupied(slot) => {
        let entry = slot.into_mut();
        entry.subscribers += 1;
        // Later subscribers may carry a fresher closure (new client config).
        entry.fetcher = fetcher;
        let rx = entry.tx.subscribe();

        let needs_fetch = entry.is_stale(self.inner.policy.stale_after);
        if needs_fetch {
          self.issue_fetch(&key, entry);
        }
        if entry.refresh.is_none() {
          // Subscriber count was zero; restart the floor timer, anchored so
          // the entry's age never exceeds one full interval.
          let age = entry.fetched_at.map(|t| t.elapsed()).unwrap_or(every);
          let first_in = if needs_fetch {
            every
          } else {
            every.saturating_sub(age)
          };
          entry.refresh = Some(self.spawn_refresh(&key, first_in));
        }
        rx
      }
    };

    Subscription {
      key,
      rx,
      cache: self.clone(),
    }
  }

  /// Mark all entries matching `predicate` stale. Entries with subscribers
  /// refetch immediately (coalesced with any in-flight fetch); entries
  /// without defer the refetch until the next subscription.
  pub fn invalidate<P>(&self, predicate: P)
  where
    P: Fn(&ResourceKey) -> bool,
  {
    let mut entries = self.entries();
    for (key, entry) in entries.iter_mut() {
      if !predicate(key) {
        continue;
      }
      entry.stale = true;
      if entry.subscribers > 0 {
        self.issue_fetch(key, entry);
      } else {
        debug!(key = %key, "invalidated with no subscribers, refetch deferred");
      }
    }
  }

  /// Manual refresh: invalidate every entry.
  pub fn refresh_all(&self) {
    self.invalidate(|_| true);
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<ResourceKey, CacheEntry>> {
    // A poisoned lock means a fetch task panicked mid-update; the map itself
    // is still consistent, so keep serving.
    self
      .inner
      .entries
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Start a fetch for `entry`, or coalesce into a follow-up if one is
  /// already in flight. Status flips synchronously so subscribers observe
  /// `fetching`/`stale-fetching` before this returns.
  fn issue_fetch(&self, key: &ResourceKey, entry: &mut CacheEntry) {
    if entry.in_flight {
      entry.rerun = true;
      trace!(key = %key, "fetch already in flight, coalescing");
      return;
    }
    entry.in_flight = true;
    entry.epoch += 1;

    let has_value = entry.tx.borrow().value.is_some();
    entry.tx.send_modify(|snap| {
      snap.status = if has_value {
        QueryStatus::StaleFetching
      } else {
        QueryStatus::Fetching
      };
    });

    let cache = self.clone();
    let key = key.clone();
    let fetcher = entry.fetcher.clone();
    let epoch = entry.epoch;
    tokio::spawn(async move {
      cache.run_fetch(key, fetcher, epoch).await;
    });
  }

  /// Run one fetch with timeout and bounded retries, then apply the outcome.
  async fn run_fetch(&self, key: ResourceKey, fetcher: Fetcher, epoch: u64) {
    let policy = self.inner.policy;
    let mut attempt: u32 = 0;

    let outcome = loop {
      let result = match tokio::time::timeout(policy.fetch_timeout, fetcher()).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout(policy.fetch_timeout)),
      };

      match result {
        Ok(value) => break Ok(value),
        Err(err) if attempt < policy.retry_limit => {
          debug!(key = %key, attempt, error = %err, "fetch failed, retrying");
          attempt += 1;
          tokio::time::sleep(policy.retry_delay).await;
        }
        Err(err) => break Err(err),
      }
    };

    self.apply(&key, epoch, outcome);
  }

  /// Apply a fetch outcome. Results from superseded issues are discarded;
  /// an in-flight result is still applied after the last unsubscribe.
  fn apply(&self, key: &ResourceKey, epoch: u64, outcome: FetchResult) {
    let mut entries = self.entries();
    let Some(entry) = entries.get_mut(key) else {
      return;
    };
    if entry.epoch != epoch {
      trace!(key = %key, "discarding superseded fetch result");
      return;
    }
    entry.in_flight = false;

    match outcome {
      Ok(value) => {
        entry.fetched_at = Some(Instant::now());
        entry.stale = false;
        entry.tx.send_modify(|snap| {
          snap.value = Some(value);
          snap.status = QueryStatus::Idle;
          snap.last_error = None;
          snap.fetched_at = Some(Utc::now());
        });
      }
      Err(err) => {
        warn!(key = %key, error = %err, "fetch failed after retries");
        entry.tx.send_modify(|snap| {
          snap.status = QueryStatus::Error;
          snap.last_error = Some(err.to_string());
        });
      }
    }

    if entry.rerun {
      entry.rerun = false;
      self.issue_fetch(key, entry);
    }
  }

  fn spawn_refresh(&self, key: &ResourceKey, first_in: Duration) -> JoinHandle<()> {
    let cache = self.clone();
    let key = key.clone();
    let every = self.inner.policy.refresh_interval;

    tokio::spawn(async move {
      let start = tokio::time::Instant::now() + first_in;
      let mut ticker = tokio::time::interval_at(start, every);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        ticker.tick().await;
        cache.refresh_tick(&key);
      }
    })
  }

  fn refresh_tick(&self, key: &ResourceKey) {
    let mut entries = self.entries();
    if let Some(entry) = entries.get_mut(key) {
      if entry.subscribers > 0 {
        trace!(key = %key, "freshness floor refetch");
        self.issue_fetch(key, entry);
      }
    }
  }

  fn unsubscribe(&self, key: &ResourceKey) {
    let mut entries = self.entries();
    if let Some(entry) = entries.get_mut(key) {
      entry.subscribers = entry.subscribers.saturating_sub(1);
      if entry.subscribers == 0 {
        // Retain the entry for reuse but stop the floor timer; staleness is
        // re-checked on the next subscription.
        if let Some(task) = entry.refresh.take() {
          task.abort();
        }
      }
    }
  }
}

/// Handle to one subscribed resource key. Dropping it unsubscribes; an
/// in-flight fetch is not cancelled and its result is still cached.
pub struct Subscription {
  key: ResourceKey,
  rx: watch::Receiver<QuerySnapshot>,
  cache: QueryCache,
}

impl Subscription {
  pub fn key(&self) -> &ResourceKey {
    &self.key
  }

  /// Current snapshot, read synchronously.
  pub fn snapshot(&self) -> QuerySnapshot {
    self.rx.borrow().clone()
  }

  /// Wait for the next snapshot change and return it.
  pub async fn changed(&mut self) -> QuerySnapshot {
    // The sender lives in the cache this subscription holds, so `changed`
    // only fails during teardown; serve the last snapshot in that case.
    let _ = self.rx.changed().await;
    self.rx.borrow_and_update().clone()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.cache.unsubscribe(&self.key);
  }
}
