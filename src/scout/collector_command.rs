use crate::scout::collector::{CollectError, CollectResult, Collector};
use crate::scout::item::{Item, ItemsPayload};
use crate::scout::util::{CommandError, run_command_with_timeout, truncate_with_ellipsis};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

/// `EX_TEMPFAIL` from sysexits.h.
const EXIT_RATE_LIMITED: i32 = 75;
/// `EX_NOPERM` from sysexits.h.
const EXIT_AUTH_FAILURE: i32 = 77;
const MAX_ERROR_CHARS: usize = 200;

/// Runs an external collector binary per call:
/// `<bin> search <query> --limit <n>`, `<bin> source <id> --limit <n>`,
/// `<bin> thread <id> --limit <n>`, `<bin> resolve <id>`.
/// Items are read as JSON from stdout.
pub struct CommandCollector {
    program: PathBuf,
    timeout: Duration,
    label: String,
}

#[derive(Debug, Deserialize)]
struct ResolvedHandle {
    #[serde(alias = "username")]
    handle: Option<String>,
}

impl CommandCollector {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        let label = format!("command:{}", program.display());
        Self {
            program,
            timeout,
            label,
        }
    }

    fn invoke(&self, args: &[&str]) -> CollectResult<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        let output = run_command_with_timeout(&mut cmd, self.timeout).map_err(|err| match err {
            CommandError::TimedOut(secs) => CollectError::Timeout(secs),
            other => CollectError::Transport(other.to_string()),
        })?;
        if output.status.success() {
            return Ok(output.stdout);
        }
        Err(classify_failure(output.status.code(), &output.stderr))
    }

    fn items(&self, args: &[&str]) -> CollectResult<Vec<Item>> {
        let stdout = self.invoke(args)?;
        parse_items(&stdout)
    }
}

pub fn parse_items(stdout: &str) -> CollectResult<Vec<Item>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<ItemsPayload>(trimmed)
        .map(ItemsPayload::into_items)
        .map_err(|err| CollectError::Malformed(err.to_string()))
}

pub fn classify_failure(code: Option<i32>, stderr: &str) -> CollectError {
    let detail = truncate_with_ellipsis(stderr.trim(), MAX_ERROR_CHARS);
    match code {
        Some(EXIT_AUTH_FAILURE) => return CollectError::AuthFailure(detail),
        Some(EXIT_RATE_LIMITED) => return CollectError::RateLimited(detail),
        _ => {}
    }
    let lower = stderr.to_ascii_lowercase();
    if ["401", "403", "unauthorized", "forbidden"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        return CollectError::AuthFailure(detail);
    }
    if ["429", "rate limit", "too many requests"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        return CollectError::RateLimited(detail);
    }
    let detail = if detail.is_empty() {
        format!("exit code {}", code.map_or("signal".to_string(), |c| c.to_string()))
    } else {
        detail
    };
    CollectError::Transport(detail)
}

impl Collector for CommandCollector {
    fn name(&self) -> &str {
        &self.label
    }

    fn search(&self, query: &str, limit: usize) -> CollectResult<Vec<Item>> {
        let limit = limit.to_string();
        self.items(&["search", query, "--limit", &limit])
    }

    fn fetch_by_source(&self, source_id: &str, limit: usize) -> CollectResult<Vec<Item>> {
        let limit = limit.to_string();
        self.items(&["source", source_id, "--limit", &limit])
    }

    fn fetch_thread(&self, conversation_id: &str, limit: usize) -> CollectResult<Vec<Item>> {
        let limit = limit.to_string();
        self.items(&["thread", conversation_id, "--limit", &limit])
    }

    fn resolve_handle(&self, source_id: &str) -> CollectResult<Option<String>> {
        let stdout = self.invoke(&["resolve", source_id])?;
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let parsed: ResolvedHandle =
            serde_json::from_str(trimmed).map_err(|err| CollectError::Malformed(err.to_string()))?;
        Ok(parsed
            .handle
            .map(|h| h.trim().trim_start_matches('@').to_string())
            .filter(|h| !h.is_empty()))
    }
}
