//! Long-lived push connection with reconnect and backoff.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, watch, Notify};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::ApiError;

use super::notification::Notification;
use super::sse::SseDecoder;

const SSE_PATH: &str = "/api/sse";

/// Matches the backend's per-subscriber queue bound.
const CHANNEL_CAPACITY: usize = 100;

/// Lifecycle of the push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
  Connecting,
  Open,
  /// Transport failed; a reconnect attempt follows after backoff.
  Errored,
  /// Explicit teardown; terminal.
  Closed,
}

/// Reconnect backoff tuning. The delay doubles on consecutive failures up to
/// `max_backoff` and resets once a connection opens.
#[derive(Debug, Clone, Copy)]
pub struct PushOptions {
  pub initial_backoff: Duration,
  pub max_backoff: Duration,
}

impl Default for PushOptions {
  fn default() -> Self {
    Self {
      initial_backoff: Duration::from_secs(1),
      max_backoff: Duration::from_secs(30),
    }
  }
}

/// The one logical push connection of an application session.
///
/// Decoded notifications fan out on a broadcast channel; transport mechanics
/// (frames, reconnects) never leak to consumers.
pub struct PushClient {
  notifications: broadcast::Sender<Notification>,
  state: watch::Receiver<ConnectionState>,
  shutdown: Arc<Notify>,
}

impl PushClient {
  /// Connect to the push endpoint under `base` and keep the connection
  /// alive until [`close`](Self::close).
  pub fn connect(base: Url) -> Self {
    Self::with_options(base, PushOptions::default())
  }

  pub fn with_options(base: Url, options: PushOptions) -> Self {
    let (notifications, _) = broadcast::channel(CHANNEL_CAPACITY);
    let (state_tx, state) = watch::channel(ConnectionState::Connecting);
    let shutdown = Arc::new(Notify::new());

    let task_notifications = notifications.clone();
    let task_shutdown = shutdown.clone();
    tokio::spawn(async move {
      connection_loop(base, options, task_notifications, state_tx, task_shutdown).await;
    });

    Self {
      notifications,
      state,
      shutdown,
    }
  }

  /// New receiver for decoded notifications.
  pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
    self.notifications.subscribe()
  }

  /// Watch the connection lifecycle.
  pub fn state(&self) -> watch::Receiver<ConnectionState> {
    self.state.clone()
  }

  /// Tear the connection down; no reconnect attempts follow.
  pub fn close(&self) {
    self.shutdown.notify_one();
  }
}

async fn connection_loop(
  base: Url,
  options: PushOptions,
  notifications: broadcast::Sender<Notification>,
  state: watch::Sender<ConnectionState>,
  shutdown: Arc<Notify>,
) {
  let endpoint = match base.join(SSE_PATH) {
    Ok(url) => url,
    Err(err) => {
      warn!(base = %base, error = %err, "invalid push endpoint, giving up");
      state.send_replace(ConnectionState::Closed);
      return;
    }
  };
  let client = match reqwest::Client::builder().build() {
    Ok(client) => client,
    Err(err) => {
      warn!(error = %err, "could not build http client for push channel");
      state.send_replace(ConnectionState::Closed);
      return;
    }
  };

  let mut backoff = options.initial_backoff;
  loop {
    state.send_replace(ConnectionState::Connecting);
    debug!(url = %endpoint, "connecting push channel");

    tokio::select! {
      _ = shutdown.notified() => {
        state.send_replace(ConnectionState::Closed);
        return;
      }
      result = read_stream(&client, &endpoint, &notifications, &state) => {
        let was_open = *state.borrow() == ConnectionState::Open;
        match result {
          Ok(()) => debug!("push channel closed by server"),
          Err(err) => debug!(error = %err, "push channel transport error"),
        }
        state.send_replace(ConnectionState::Errored);
        if was_open {
          backoff = options.initial_backoff;
        }
      }
    }

    tokio::select! {
      _ = shutdown.notified() => {
        state.send_replace(ConnectionState::Closed);
        return;
      }
      _ = tokio::time::sleep(backoff) => {}
    }
    backoff = (backoff * 2).min(options.max_backoff);
  }
}

/// Read one connection's worth of frames, forwarding each decoded
/// notification exactly once. Returns when the transport ends.
async fn read_stream(
  client: &reqwest::Client,
  url: &Url,
  notifications: &broadcast::Sender<Notification>,
  state: &watch::Sender<ConnectionState>,
) -> Result<(), ApiError> {
  let response = client
    .get(url.clone())
    .header(reqwest::header::ACCEPT, "text/event-stream")
    .send()
    .await?;

  let status = response.status();
  if !status.is_success() {
    return Err(ApiError::Status {
      status: status.as_u16(),
      endpoint: SSE_PATH.to_string(),
    });
  }

  info!("push channel open");
  state.send_replace(ConnectionState::Open);

  let mut stream = response.bytes_stream();
  let mut decoder = SseDecoder::new();
  while let Some(chunk) = stream.next().await {
    let chunk = chunk?;
    for frame in decoder.feed(&chunk) {
      match Notification::parse(frame.event.as_deref()) {
        Some(notification) => {
          trace!(%notification, "push notification");
          // No receivers is fine; subscribers come and go.
          let _ = notifications.send(notification);
        }
        None => trace!(event = ?frame.event, "ignoring unrecognized push event"),
      }
    }
  }

  Ok(())
}
