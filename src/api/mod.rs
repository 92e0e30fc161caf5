//! Data source adapter: typed requests against the Mimir read endpoints.

mod client;
pub mod types;

pub use client::ApiClient;
