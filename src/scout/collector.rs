use crate::scout::collector_command::CommandCollector;
use crate::scout::collector_http::HttpCollector;
use crate::scout::item::Item;
use crate::scout::watchlist::{CollectorKind, Watchlist};
use anyhow::{Context, Result};
use serde::Serialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    AuthFailure,
    RateLimited,
    Malformed,
    Transport,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::AuthFailure => "auth_failure",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Malformed => "malformed",
            ErrorKind::Transport => "transport",
        }
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("collector call timed out after {0}s")]
    Timeout(u64),
    #[error("collector rejected credentials: {0}")]
    AuthFailure(String),
    #[error("collector rate limited: {0}")]
    RateLimited(String),
    #[error("collector returned a malformed payload: {0}")]
    Malformed(String),
    #[error("collector transport failure: {0}")]
    Transport(String),
}

impl CollectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollectError::Timeout(_) => ErrorKind::Timeout,
            CollectError::AuthFailure(_) => ErrorKind::AuthFailure,
            CollectError::RateLimited(_) => ErrorKind::RateLimited,
            CollectError::Malformed(_) => ErrorKind::Malformed,
            CollectError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Whether a failure on the first call of a source means the source is
    /// down. A malformed payload only says something about that one query.
    pub fn signals_outage(&self) -> bool {
        !matches!(self, CollectError::Malformed(_))
    }
}

pub type CollectResult<T> = std::result::Result<T, CollectError>;

/// Upstream content source. Implementations bound every call by their own
/// timeout and never retry.
pub trait Collector {
    fn name(&self) -> &str;

    fn search(&self, query: &str, limit: usize) -> CollectResult<Vec<Item>>;

    fn fetch_by_source(&self, source_id: &str, limit: usize) -> CollectResult<Vec<Item>>;

    fn fetch_thread(&self, _conversation_id: &str, _limit: usize) -> CollectResult<Vec<Item>> {
        Ok(Vec::new())
    }

    /// Map a numeric source id to a human-readable handle, if the upstream knows it.
    fn resolve_handle(&self, _source_id: &str) -> CollectResult<Option<String>> {
        Ok(None)
    }
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

pub fn call_timeout(watchlist: &Watchlist) -> Duration {
    let secs = env_non_empty("SCOUT_CALL_TIMEOUT_SECS")
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(watchlist.schedule.call_timeout_secs);
    Duration::from_secs(secs)
}

/// Build the collector once per process; it is handed down by reference.
pub fn build_collector(watchlist: &Watchlist) -> Result<Box<dyn Collector>> {
    let timeout = call_timeout(watchlist);
    let cfg = &watchlist.collector;
    match cfg.kind {
        CollectorKind::Command => {
            let configured = env_non_empty("SCOUT_COLLECTOR_BIN").unwrap_or_else(|| cfg.command.clone());
            let program = which::which(&configured)
                .with_context(|| format!("collector binary `{configured}` not found"))?;
            Ok(Box::new(CommandCollector::new(program, timeout)))
        }
        CollectorKind::Http => {
            let base_url = env_non_empty("SCOUT_COLLECTOR_URL")
                .or_else(|| cfg.base_url.clone())
                .context("collector.base_url is required for kind=http")?;
            let token = env_non_empty(&cfg.token_env);
            Ok(Box::new(HttpCollector::new(&base_url, token, timeout)?))
        }
    }
}
