use crate::scout::dedup::SeenSet;
use crate::scout::paths::ScoutPaths;
use crate::scout::util::{now_epoch_secs, write_json_atomic};
use crate::scout::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleState {
    pub schema_version: u32,
    #[serde(alias = "keyword_index")]
    pub keyword_cursor: usize,
    #[serde(alias = "account_index")]
    pub account_cursor: usize,
    #[serde(alias = "seen_posts")]
    pub seen_item_ids: SeenSet,
    pub last_run_epoch_secs: Option<u64>,
    /// Watchlist schema versions whose migration has been folded into this file.
    pub applied_migrations: Vec<u32>,
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            keyword_cursor: 0,
            account_cursor: 0,
            seen_item_ids: SeenSet::default(),
            last_run_epoch_secs: None,
            applied_migrations: Vec::new(),
        }
    }
}

pub fn state_file_path(paths: &ScoutPaths) -> PathBuf {
    paths.state_file.clone()
}

/// Keep the unreadable bytes next to the original and start fresh.
pub(crate) fn quarantine_corrupt_file(file: &Path, raw: &[u8], stage: &str, reason: &str, err: &str) {
    let timestamp = now_epoch_secs().unwrap_or(0);
    let backup_path = file.with_extension(format!("json.corrupt.{timestamp}"));
    let _ = if raw.is_empty() {
        fs::copy(file, &backup_path).map(|_| ())
    } else {
        fs::write(&backup_path, raw)
    };

    warn::emit(WarnEvent {
        code: "STATE_CORRUPT",
        stage,
        action: "load-state",
        entity: "na",
        source: &file.display().to_string(),
        retry: "started-fresh",
        reason,
        err,
    });
}

pub fn load(paths: &ScoutPaths) -> Result<ScheduleState> {
    let file = state_file_path(paths);
    if !file.exists() {
        return Ok(ScheduleState::default());
    }

    let raw = match fs::read(&file) {
        Ok(raw) => raw,
        Err(err) => {
            quarantine_corrupt_file(&file, &[], "schedule-state", "read-failed", &format!("{err:#}"));
            return Ok(ScheduleState::default());
        }
    };

    match serde_json::from_slice::<ScheduleState>(&raw) {
        Ok(mut parsed) => {
            if parsed.schema_version < STATE_SCHEMA_VERSION {
                parsed.schema_version = STATE_SCHEMA_VERSION;
            }
            Ok(parsed)
        }
        Err(err) => {
            quarantine_corrupt_file(&file, &raw, "schedule-state", "json-parse-failed", &format!("{err:#}"));
            Ok(ScheduleState::default())
        }
    }
}

pub fn save(paths: &ScoutPaths, state: &ScheduleState) -> Result<PathBuf> {
    let file = state_file_path(paths);
    write_json_atomic(&file, state)
        .with_context(|| format!("failed to write {}", file.display()))?;
    Ok(file)
}
