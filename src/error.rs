//! Error types for the sync core.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by fetch operations against the Mimir API.
///
/// The cache treats every variant uniformly as a fetch failure: retried a
/// bounded number of times, then surfaced to consumers as `status = Error`
/// with the message in `last_error`. Nothing here escapes the cache boundary.
#[derive(Error, Debug)]
pub enum ApiError {
  /// Network-level failure (connect, TLS, body read, JSON decode).
  #[error("http request failed: {0}")]
  Request(#[from] reqwest::Error),

  /// The server answered with a non-2xx status.
  #[error("server returned {status} for {endpoint}")]
  Status { status: u16, endpoint: String },

  /// The fetch did not resolve within the configured bound.
  #[error("request timed out after {0:?}")]
  Timeout(Duration),

  /// Endpoint URL could not be constructed.
  #[error("invalid url: {0}")]
  Url(#[from] url::ParseError),
}
