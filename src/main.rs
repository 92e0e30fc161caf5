use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use mimir_sync::api::ApiClient;
use mimir_sync::config::Config;
use mimir_sync::push::{ConnectionState, PushClient};
use mimir_sync::router;
use mimir_sync::sync::{QueryCache, QuerySnapshot, QueryStatus, ResourceKey, ResourceValue};

#[derive(Parser, Debug)]
#[command(name = "mimir-watch")]
#[command(about = "Follow live Mimir dashboard state from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/mimir-sync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Mimir API base url (overrides the config file)
  #[arg(long)]
  api_url: Option<String>,

  /// Project id to filter the board to
  #[arg(short, long)]
  project: Option<String>,

  /// Number of activity events to follow
  #[arg(long)]
  activity_limit: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  let mut config = Config::load(args.config.as_deref())?;
  if let Some(url) = args.api_url {
    config.api.url = url;
  }
  if let Some(project) = args.project {
    config.default_project = Some(project);
  }
  if let Some(limit) = args.activity_limit {
    config.activity_limit = Some(limit);
  }

  run(config).await
}

async fn run(config: Config) -> Result<()> {
  let base = Url::parse(&config.api.url)?;
  let api = ApiClient::new(base.clone())?;
  let cache = QueryCache::with_policy(config.sync.policy());

  let push = PushClient::connect(base);
  let _router = router::spawn(cache.clone(), push.subscribe());

  let project = config
    .default_project
    .clone()
    .unwrap_or_else(|| "all".to_string());
  let limit = config.activity_limit.unwrap_or(50);

  let keys = [
    ResourceKey::Projects,
    ResourceKey::Board { project },
    ResourceKey::Agents,
    ResourceKey::Activity { limit },
  ];
  let mut subs: Vec<_> = keys
    .iter()
    .map(|key| cache.subscribe(key.clone(), api.fetcher(key)))
    .collect();

  let mut push_state = push.state();
  info!(url = %config.api.url, "watching mimir");

  loop {
    let next_change = futures::future::select_all(subs.iter_mut().map(|sub| {
      Box::pin(async move {
        let snapshot = sub.changed().await;
        (sub.key().clone(), snapshot)
      })
    }));

    tokio::select! {
      ((key, snapshot), _, _) = next_change => {
        report(&key, &snapshot);
      }
      result = push_state.changed() => {
        if result.is_ok() {
          match *push_state.borrow_and_update() {
            ConnectionState::Connecting => debug!("push channel connecting"),
            ConnectionState::Open => info!("push channel open"),
            ConnectionState::Errored => warn!("push channel error, reconnecting"),
            ConnectionState::Closed => info!("push channel closed"),
          }
        }
      }
      _ = hangup() => {
        info!("manual refresh requested");
        cache.refresh_all();
      }
      _ = tokio::signal::ctrl_c() => {
        info!("shutting down");
        push.close();
        break;
      }
    }
  }

  Ok(())
}

fn report(key: &ResourceKey, snapshot: &QuerySnapshot) {
  let summary = snapshot
    .value
    .as_ref()
    .map(describe)
    .unwrap_or_else(|| "no data".to_string());

  match snapshot.status {
    QueryStatus::Idle => info!(key = %key, %summary, "updated"),
    QueryStatus::Fetching | QueryStatus::StaleFetching => debug!(key = %key, "fetching"),
    QueryStatus::Error => warn!(
      key = %key,
      error = snapshot.last_error.as_deref().unwrap_or("unknown"),
      %summary,
      "fetch failed, serving last known data"
    ),
  }
}

fn describe(value: &ResourceValue) -> String {
  match value {
    ResourceValue::Projects(projects) => format!("{} projects", projects.len()),
    ResourceValue::Board(board) => format!(
      "{} tasks, {} done, {} blocked",
      board.total,
      board.done_count,
      board.columns.blocked.len()
    ),
    ResourceValue::Agents(agents) => format!("{} active agents", agents.len()),
    ResourceValue::Activity(events) => match events.first() {
      Some(latest) => format!("{} events, latest: {}", events.len(), latest.summary),
      None => "no events".to_string(),
    },
  }
}

/// Resolves when SIGHUP arrives (never, off unix).
#[cfg(unix)]
async fn hangup() {
  use tokio::signal::unix::{signal, SignalKind};
  match signal(SignalKind::hangup()) {
    Ok(mut stream) => {
      stream.recv().await;
    }
    Err(err) => {
      warn!(error = %err, "could not install SIGHUP handler");
      std::future::pending::<()>().await
    }
  }
}

#[cfg(not(unix))]
async fn hangup() {
  std::future::pending::<()>().await
}
