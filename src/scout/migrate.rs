//! Watchlist schema upgrades.
//!
//! Schema 1 kept runtime fields inside the watchlist (`seen_posts` at the top
//! level, `keyword_index`/`account_index`/`last_run` under `[schedule]`) and
//! spelled tier-2 groups as `accounts.tier2_<group>`. Schema 2 moves the
//! runtime fields into the schedule state file and nests groups under
//! `accounts.tier2`.

use crate::scout::audit;
use crate::scout::paths::ScoutPaths;
use crate::scout::state::{self, ScheduleState};
use crate::scout::watchlist::{self, LoadedWatchlist, WATCHLIST_SCHEMA_VERSION};
use anyhow::{Result, bail};
use chrono::{DateTime, Local, NaiveDateTime};
use toml::{Table, Value};

/// Runtime fields found in a schema-1 watchlist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyScheduleFields {
    pub keyword_index: Option<usize>,
    pub account_index: Option<usize>,
    pub seen_posts: Vec<String>,
    pub last_run_epoch_secs: Option<u64>,
}

impl LegacyScheduleFields {
    pub fn is_empty(&self) -> bool {
        self.keyword_index.is_none()
            && self.account_index.is_none()
            && self.seen_posts.is_empty()
            && self.last_run_epoch_secs.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableMigration {
    pub legacy: Option<LegacyScheduleFields>,
    pub migrated_from: Option<u32>,
}

/// Missing `schema_version` means schema 1.
pub fn schema_version_of(table: &Table) -> Result<u32> {
    match table.get("schema_version") {
        None => Ok(1),
        Some(Value::Integer(v)) if *v >= 1 => Ok(u32::try_from(*v)?),
        Some(other) => bail!("schema_version must be a positive integer, got {other}"),
    }
}

/// Rewrite a parsed watchlist table to the current schema in place.
pub fn migrate_table(table: &mut Table) -> Result<TableMigration> {
    let version = schema_version_of(table)?;
    if version > WATCHLIST_SCHEMA_VERSION {
        bail!(
            "watchlist schema_version {version} is newer than supported version {WATCHLIST_SCHEMA_VERSION}"
        );
    }
    if version == WATCHLIST_SCHEMA_VERSION {
        return Ok(TableMigration::default());
    }

    let legacy = lift_legacy_fields(table);
    nest_tier2_groups(table)?;
    table.insert(
        "schema_version".to_string(),
        Value::Integer(i64::from(WATCHLIST_SCHEMA_VERSION)),
    );

    Ok(TableMigration {
        legacy: (!legacy.is_empty()).then_some(legacy),
        migrated_from: Some(version),
    })
}

fn lift_legacy_fields(table: &mut Table) -> LegacyScheduleFields {
    let mut legacy = LegacyScheduleFields::default();

    if let Some(Value::Array(seen)) = table.remove("seen_posts") {
        legacy.seen_posts = seen
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Integer(i) => Some(i.to_string()),
                _ => None,
            })
            .filter(|s| !s.trim().is_empty())
            .collect();
    }

    if let Some(Value::Table(schedule)) = table.get_mut("schedule") {
        legacy.keyword_index = schedule.remove("keyword_index").and_then(as_index);
        legacy.account_index = schedule.remove("account_index").and_then(as_index);
        legacy.last_run_epoch_secs = schedule.remove("last_run").and_then(as_epoch_secs);
    }

    legacy
}

fn as_index(value: Value) -> Option<usize> {
    match value {
        Value::Integer(i) => usize::try_from(i).ok(),
        _ => None,
    }
}

fn as_epoch_secs(value: Value) -> Option<u64> {
    match value {
        Value::Integer(i) => u64::try_from(i).ok(),
        Value::String(s) => parse_timestamp(&s),
        Value::Datetime(dt) => parse_timestamp(&dt.to_string()),
        _ => None,
    }
}

/// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` in local time.
fn parse_timestamp(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return u64::try_from(dt.timestamp()).ok();
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    let local = naive.and_local_timezone(Local).earliest()?;
    u64::try_from(local.timestamp()).ok()
}

fn nest_tier2_groups(table: &mut Table) -> Result<()> {
    let Some(Value::Table(accounts)) = table.get_mut("accounts") else {
        return Ok(());
    };
    let flat_keys: Vec<String> = accounts
        .keys()
        .filter(|k| k.starts_with("tier2_"))
        .cloned()
        .collect();
    if flat_keys.is_empty() {
        return Ok(());
    }

    let mut nested = match accounts.remove("tier2") {
        None => Table::new(),
        Some(Value::Table(t)) => t,
        // a bare list under `tier2` is an unnamed group
        Some(Value::Array(list)) => {
            let mut t = Table::new();
            t.insert(watchlist::DEFAULT_TIER2_GROUP.to_string(), Value::Array(list));
            t
        }
        Some(other) => bail!("accounts.tier2 must be a table of groups, got {other}"),
    };
    for key in flat_keys {
        let group = key.trim_start_matches("tier2_").to_string();
        let Some(value) = accounts.remove(&key) else {
            continue;
        };
        match nested.get_mut(&group) {
            Some(Value::Array(existing)) => {
                if let Value::Array(more) = value {
                    existing.extend(more);
                }
            }
            _ => {
                nested.insert(group, value);
            }
        }
    }
    accounts.insert("tier2".to_string(), Value::Table(nested));
    Ok(())
}

/// Move fields lifted from an old watchlist into the schedule state and
/// rewrite the watchlist at the current schema. State is written before the
/// watchlist so an interrupted migration never loses the seen-set. Values
/// already present in the state win.
pub fn apply_pending(
    paths: &ScoutPaths,
    loaded: &mut LoadedWatchlist,
    state: &mut ScheduleState,
) -> Result<Option<String>> {
    let Some(from) = loaded.migrated_from else {
        return Ok(None);
    };

    let mut moved = Vec::new();
    if let Some(legacy) = loaded.legacy.take() {
        if state.seen_item_ids.is_empty() && !legacy.seen_posts.is_empty() {
            for id in &legacy.seen_posts {
                state.seen_item_ids.insert(id);
            }
            moved.push(format!("seen_posts({})", legacy.seen_posts.len()));
        }
        if state.keyword_cursor == 0
            && let Some(idx) = legacy.keyword_index
        {
            state.keyword_cursor = idx;
            moved.push("keyword_index".to_string());
        }
        if state.account_cursor == 0
            && let Some(idx) = legacy.account_index
        {
            state.account_cursor = idx;
            moved.push("account_index".to_string());
        }
        if state.last_run_epoch_secs.is_none()
            && let Some(ts) = legacy.last_run_epoch_secs
        {
            state.last_run_epoch_secs = Some(ts);
            moved.push("last_run".to_string());
        }
    }
    if !state.applied_migrations.contains(&from) {
        state.applied_migrations.push(from);
    }

    state::save(paths, state)?;
    loaded.watchlist.schema_version = WATCHLIST_SCHEMA_VERSION;
    watchlist::save_watchlist(paths, &loaded.watchlist)?;
    loaded.migrated_from = None;

    let message = if moved.is_empty() {
        format!("watchlist schema {from} -> {WATCHLIST_SCHEMA_VERSION}")
    } else {
        format!(
            "watchlist schema {from} -> {WATCHLIST_SCHEMA_VERSION}; moved {} into state",
            moved.join(", ")
        )
    };
    tracing::info!(from, to = WATCHLIST_SCHEMA_VERSION, moved = %moved.join(","), "watchlist migrated");
    audit::record(paths, "migrate", "ok", &message);
    Ok(Some(message))
}
