//! Synchronized query cache keeping independently-fetched views consistent.
//!
//! This module owns the client-side freshness policy:
//! - one cache entry per resource key, created on first subscription
//! - stale-while-revalidate serving with a fixed staleness window
//! - a fixed-interval refetch floor for subscribed entries
//! - push-driven invalidation with at most one in-flight fetch per key

mod cache;
mod resource;

pub use cache::{Fetcher, FetchResult, QueryCache, QuerySnapshot, QueryStatus, Subscription, SyncPolicy};
pub use resource::{Resource, ResourceKey, ResourceValue};
