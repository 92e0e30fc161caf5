//! Push channel client: one long-lived SSE connection, decoded into typed
//! notifications and fanned out on a broadcast channel.

mod client;
mod notification;
mod sse;

pub use client::{ConnectionState, PushClient, PushOptions};
pub use notification::Notification;
pub use sse::{SseDecoder, SseFrame};
