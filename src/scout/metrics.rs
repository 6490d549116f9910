//! Per-entity quality counters, persisted apart from the rotation state so
//! quality history survives a schedule reset.

use crate::scout::item::{EngagementWeights, Item};
use crate::scout::paths::ScoutPaths;
use crate::scout::state::quarantine_corrupt_file;
use crate::scout::util::write_json_atomic;
use crate::scout::watchlist::EntityKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

pub const METRICS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricEntry {
    #[serde(alias = "total_attempts")]
    pub attempts: u64,
    #[serde(alias = "successes")]
    pub hits: u64,
    #[serde(alias = "failures")]
    pub misses: u64,
    pub consecutive_failures: u64,
    #[serde(alias = "total_posts", alias = "total_results")]
    pub total_items: u64,
    pub cumulative_engagement: u64,
    pub last_seen_epoch_secs: Option<u64>,
    pub last_attempt_epoch_secs: Option<u64>,
    /// Error kind of the most recent failed collector call, cleared on a hit.
    pub last_error: Option<String>,
}

impl MetricEntry {
    pub fn avg_engagement(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        self.cumulative_engagement as f64 / self.total_items as f64
    }

    pub fn hit_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.hits as f64 / self.attempts as f64
    }

    fn record_hit(&mut self, items: &[Item], weights: &EngagementWeights, now: u64) {
        self.attempts += 1;
        self.hits += 1;
        self.consecutive_failures = 0;
        self.total_items += items.len() as u64;
        self.cumulative_engagement = items.iter().fold(self.cumulative_engagement, |acc, item| {
            acc.saturating_add(item.engagement.weighted(weights))
        });
        self.last_seen_epoch_secs = Some(now);
        self.last_attempt_epoch_secs = Some(now);
        self.last_error = None;
    }

    fn record_miss(&mut self, error: Option<&str>, now: u64) {
        self.attempts += 1;
        self.misses += 1;
        self.consecutive_failures += 1;
        self.last_attempt_epoch_secs = Some(now);
        if let Some(error) = error {
            self.last_error = Some(error.to_string());
        }
    }

    /// Older ledgers tracked attempts separately; attempts is always derived.
    fn normalize(&mut self) {
        self.attempts = self.hits + self.misses;
        if self.consecutive_failures > self.misses {
            self.consecutive_failures = self.misses;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsLedger {
    pub schema_version: u32,
    pub keywords: BTreeMap<String, MetricEntry>,
    #[serde(alias = "channels")]
    pub accounts: BTreeMap<String, MetricEntry>,
    pub last_maintain_epoch_secs: Option<u64>,
}

impl Default for MetricsLedger {
    fn default() -> Self {
        Self {
            schema_version: METRICS_SCHEMA_VERSION,
            keywords: BTreeMap::new(),
            accounts: BTreeMap::new(),
            last_maintain_epoch_secs: None,
        }
    }
}

impl MetricsLedger {
    fn entries_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<String, MetricEntry> {
        match kind {
            EntityKind::Keyword => &mut self.keywords,
            EntityKind::Account => &mut self.accounts,
        }
    }

    pub fn entries(&self, kind: EntityKind) -> &BTreeMap<String, MetricEntry> {
        match kind {
            EntityKind::Keyword => &self.keywords,
            EntityKind::Account => &self.accounts,
        }
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&MetricEntry> {
        self.entries(kind).get(id)
    }

    /// A non-empty batch is a hit; an empty one is a miss.
    pub fn record_attempt(
        &mut self,
        kind: EntityKind,
        id: &str,
        items: &[Item],
        weights: &EngagementWeights,
        now: u64,
    ) {
        let entry = self.entries_mut(kind).entry(id.to_string()).or_default();
        if items.is_empty() {
            entry.record_miss(None, now);
        } else {
            entry.record_hit(items, weights, now);
        }
    }

    /// A collector error counts as a miss for the entity.
    pub fn record_failure(&mut self, kind: EntityKind, id: &str, error_kind: &str, now: u64) {
        self.entries_mut(kind)
            .entry(id.to_string())
            .or_default()
            .record_miss(Some(error_kind), now);
    }

    pub fn avg_engagement(&self, kind: EntityKind, id: &str) -> f64 {
        self.get(kind, id).map_or(0.0, MetricEntry::avg_engagement)
    }

    pub fn all_entries(&self) -> impl Iterator<Item = (EntityKind, &String, &MetricEntry)> {
        self.keywords
            .iter()
            .map(|(id, e)| (EntityKind::Keyword, id, e))
            .chain(self.accounts.iter().map(|(id, e)| (EntityKind::Account, id, e)))
    }

    fn normalize(&mut self) {
        for entry in self.keywords.values_mut().chain(self.accounts.values_mut()) {
            entry.normalize();
        }
        if self.schema_version < METRICS_SCHEMA_VERSION {
            self.schema_version = METRICS_SCHEMA_VERSION;
        }
    }
}

pub fn metrics_file_path(paths: &ScoutPaths) -> PathBuf {
    paths.metrics_file.clone()
}

pub fn load(paths: &ScoutPaths) -> Result<MetricsLedger> {
    let file = metrics_file_path(paths);
    if !file.exists() {
        return Ok(MetricsLedger::default());
    }

    let raw = match fs::read(&file) {
        Ok(raw) => raw,
        Err(err) => {
            quarantine_corrupt_file(&file, &[], "metrics-ledger", "read-failed", &format!("{err:#}"));
            return Ok(MetricsLedger::default());
        }
    };

    match serde_json::from_slice::<MetricsLedger>(&raw) {
        Ok(mut ledger) => {
            ledger.normalize();
            Ok(ledger)
        }
        Err(err) => {
            quarantine_corrupt_file(&file, &raw, "metrics-ledger", "json-parse-failed", &format!("{err:#}"));
            Ok(MetricsLedger::default())
        }
    }
}

pub fn save(paths: &ScoutPaths, ledger: &MetricsLedger) -> Result<PathBuf> {
    let file = metrics_file_path(paths);
    write_json_atomic(&file, ledger)
        .with_context(|| format!("failed to write {}", file.display()))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scout::item::Engagement;

    fn item(likes: u64, shares: u64) -> Item {
        Item {
            id: format!("{likes}-{shares}"),
            engagement: Engagement {
                likes,
                shares,
                ..Engagement::default()
            },
            ..Item::default()
        }
    }

    #[test]
    fn hits_plus_misses_always_equals_attempts() {
        let weights = EngagementWeights::default();
        let mut ledger = MetricsLedger::default();
        let pattern = [true, false, false, true, false, true, true, false];
        for (i, hit) in pattern.iter().enumerate() {
            let items = if *hit { vec![item(1, 0)] } else { Vec::new() };
            ledger.record_attempt(EntityKind::Account, "alice", &items, &weights, i as u64);
            if i % 3 == 0 {
                ledger.record_failure(EntityKind::Account, "alice", "timeout", i as u64);
            }
            let e = ledger.get(EntityKind::Account, "alice").expect("entry");
            assert_eq!(e.hits + e.misses, e.attempts);
        }
    }

    #[test]
    fn hit_resets_consecutive_failures() {
        let weights = EngagementWeights::default();
        let mut ledger = MetricsLedger::default();
        for _ in 0..3 {
            ledger.record_attempt(EntityKind::Keyword, "mcp", &[], &weights, 1);
        }
        ledger.record_failure(EntityKind::Keyword, "mcp", "rate_limited", 2);
        assert_eq!(
            ledger.get(EntityKind::Keyword, "mcp").expect("entry").consecutive_failures,
            4
        );
        ledger.record_attempt(EntityKind::Keyword, "mcp", &[item(3, 1)], &weights, 3);
        let e = ledger.get(EntityKind::Keyword, "mcp").expect("entry");
        assert_eq!(e.consecutive_failures, 0);
        assert!(e.last_error.is_none());
        assert_eq!(e.last_seen_epoch_secs, Some(3));
    }

    #[test]
    fn avg_engagement_is_weighted_per_item() {
        let weights = EngagementWeights::default();
        let mut ledger = MetricsLedger::default();
        ledger.record_attempt(
            EntityKind::Account,
            "bob",
            &[item(10, 0), item(0, 10)],
            &weights,
            1,
        );
        // (10 + 30) / 2
        assert_eq!(ledger.avg_engagement(EntityKind::Account, "bob"), 20.0);
        assert_eq!(ledger.avg_engagement(EntityKind::Account, "nobody"), 0.0);
    }

    #[test]
    fn legacy_ledger_is_normalized_on_parse() {
        let raw = r#"{"accounts":{"carol":{"hits":2,"misses":3,"total_posts":4}},
            "last_maintain_epoch_secs": 99}"#;
        let mut ledger: MetricsLedger = serde_json::from_str(raw).expect("parse");
        ledger.normalize();
        let e = ledger.get(EntityKind::Account, "carol").expect("entry");
        assert_eq!(e.attempts, 5);
        assert_eq!(e.total_items, 4);
        assert_eq!(ledger.last_maintain_epoch_secs, Some(99));
    }

    #[test]
    fn non_utf8_ledger_falls_back_to_empty() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = crate::scout::paths::paths_under(tmp.path().to_path_buf(), true);
        fs::create_dir_all(&paths.state_dir).expect("mkdir");
        fs::write(&paths.metrics_file, [0xff, 0xfe, b'{', 0x80]).expect("write");

        let ledger = load(&paths).expect("load");
        assert_eq!(ledger.all_entries().count(), 0);
        assert!(ledger.last_maintain_epoch_secs.is_none());
        let backups = fs::read_dir(&paths.state_dir)
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("watchlist-metrics.json.corrupt."))
            .count();
        assert_eq!(backups, 1);
    }
}
