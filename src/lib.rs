//! Live-sync client for the Mimir dashboard API.
//!
//! The crate keeps independently-fetched dashboard views (projects, board,
//! agents, activity) consistent and fresh through three inputs: a
//! fixed-interval pull schedule, an SSE push channel delivering change
//! notifications, and user-triggered manual refresh.
//!
//! Components, leaf to root:
//! - [`api`]: typed request functions against the four read endpoints
//! - [`push`]: the long-lived push connection, decoded into notifications
//! - [`sync`]: the query cache owning staleness, scheduling, invalidation
//! - [`router`]: the notification-to-cache-key invalidation mapping

pub mod api;
pub mod config;
pub mod error;
pub mod push;
pub mod router;
pub mod sync;
