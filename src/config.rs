use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::SyncPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub sync: SyncConfig,
  /// Project id the board is filtered to ("all" when unset).
  pub default_project: Option<String>,
  /// Number of activity events to pull.
  pub activity_limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: "http://localhost:8400".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Fixed refetch interval for subscribed entries, in seconds.
  pub refresh_secs: u64,
  /// Age after which a cached value is stale, in seconds.
  pub stale_secs: u64,
  /// Bound on a single fetch attempt, in seconds.
  pub fetch_timeout_secs: u64,
  /// Additional attempts after a failed fetch.
  pub retries: u32,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      refresh_secs: 30,
      stale_secs: 30,
      fetch_timeout_secs: 10,
      retries: 2,
    }
  }
}

impl SyncConfig {
  pub fn policy(&self) -> SyncPolicy {
    SyncPolicy {
      stale_after: Duration::from_secs(self.stale_secs),
      refresh_interval: Duration::from_secs(self.refresh_secs),
      fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
      retry_limit: self.retries,
      ..SyncPolicy::default()
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (error if it does not exist)
  /// 2. ./mimir-sync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/mimir-sync/config.yaml
  ///
  /// Every field has a working default, so a missing config file yields the
  /// default configuration rather than an error.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("mimir-sync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("mimir-sync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_match_production_values() {
    let config = Config::default();
    assert_eq!(config.api.url, "http://localhost:8400");
    assert_eq!(config.sync.refresh_secs, 30);
    assert_eq!(config.sync.stale_secs, 30);
    assert_eq!(config.sync.retries, 2);
    assert!(config.default_project.is_none());
  }

  #[test]
  fn test_partial_yaml_fills_defaults() {
    let config: Config = serde_yaml::from_str(
      "api:\n  url: http://mimir.internal:8400\nsync:\n  refresh_secs: 10\n",
    )
    .unwrap();
    assert_eq!(config.api.url, "http://mimir.internal:8400");
    assert_eq!(config.sync.refresh_secs, 10);
    // Untouched fields keep their defaults.
    assert_eq!(config.sync.stale_secs, 30);
    assert_eq!(config.sync.retries, 2);
  }

  #[test]
  fn test_policy_conversion() {
    let sync = SyncConfig {
      refresh_secs: 5,
      stale_secs: 7,
      fetch_timeout_secs: 3,
      retries: 1,
    };
    let policy = sync.policy();
    assert_eq!(policy.refresh_interval, Duration::from_secs(5));
    assert_eq!(policy.stale_after, Duration::from_secs(7));
    assert_eq!(policy.fetch_timeout, Duration::from_secs(3));
    assert_eq!(policy.retry_limit, 1);
  }
}
