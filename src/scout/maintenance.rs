//! Watchlist quality analysis and the `maintain` action.

use crate::scout::audit;
use crate::scout::collector::Collector;
use crate::scout::discovery::{self, ResolutionOutcome};
use crate::scout::metrics::{self, MetricEntry, MetricsLedger};
use crate::scout::paths::ScoutPaths;
use crate::scout::util::write_json_atomic;
use crate::scout::watchlist::{self, AccountTier, EntityKind, KeywordTier, MaintenanceConfig, Watchlist};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Dead,
    Struggling,
    Star,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Remove,
    ConsiderRemove,
    Promote,
}

impl SuggestedAction {
    pub fn label(self) -> &'static str {
        match self {
            SuggestedAction::Remove => "remove",
            SuggestedAction::ConsiderRemove => "consider_remove",
            SuggestedAction::Promote => "promote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub classification: Classification,
    pub action: SuggestedAction,
    pub kind: EntityKind,
    pub target: String,
    pub tier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_tier: Option<String>,
    pub protected: bool,
    pub attempts: u64,
    pub hit_rate: f64,
    pub consecutive_failures: u64,
    pub avg_engagement: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedAction {
    pub action: String,
    pub kind: EntityKind,
    pub target: String,
    pub tier: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub timestamp_epoch_secs: u64,
    pub mode: String,
    pub analyzed: usize,
    pub suggestions: Vec<Suggestion>,
    pub actions_taken: Vec<AppliedAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionOutcome>,
    pub unresolved_discovered: usize,
}

impl MaintenanceReport {
    pub fn count(&self, classification: Classification) -> usize {
        self.suggestions
            .iter()
            .filter(|s| s.classification == classification)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct MaintenanceOutcome {
    pub report: MaintenanceReport,
    pub report_file: PathBuf,
    pub watchlist_changed: bool,
}

/// Tier of an entity as the analyzer sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EntityTier {
    Keyword(KeywordTier),
    Account(AccountTier),
}

impl EntityTier {
    fn label(&self) -> String {
        match self {
            EntityTier::Keyword(t) => t.label().to_string(),
            EntityTier::Account(t) => t.label(),
        }
    }

    fn is_protected(&self) -> bool {
        match self {
            EntityTier::Keyword(t) => t.is_protected(),
            EntityTier::Account(t) => t.is_protected(),
        }
    }

    fn promotion_target(&self) -> &'static str {
        match self {
            EntityTier::Keyword(_) => KeywordTier::Core.label(),
            EntityTier::Account(_) => "tier1",
        }
    }
}

fn tier_of(watchlist: &Watchlist, kind: EntityKind, id: &str) -> Option<EntityTier> {
    match kind {
        EntityKind::Keyword => watchlist.keyword_tier(id).map(EntityTier::Keyword),
        EntityKind::Account => watchlist.account_tier(id).map(EntityTier::Account),
    }
}

/// First matching rule wins: dead, then struggling, then star.
pub fn classify(entry: &MetricEntry, protected: bool, cfg: &MaintenanceConfig) -> Option<Classification> {
    if entry.attempts < cfg.min_attempts {
        return None;
    }
    let avg = entry.avg_engagement();
    if entry.consecutive_failures >= cfg.dead_consecutive_failures
        && entry.hit_rate() < cfg.dead_max_hit_rate
    {
        Some(Classification::Dead)
    } else if avg < cfg.struggling_max_avg_engagement && entry.attempts >= cfg.struggling_min_attempts {
        Some(Classification::Struggling)
    } else if avg > cfg.star_min_avg_engagement && !protected {
        Some(Classification::Star)
    } else {
        None
    }
}

/// Classify every tracked entity with enough history. Ledger entries for
/// entities no longer in the watchlist are skipped.
pub fn analyze(ledger: &MetricsLedger, watchlist: &Watchlist) -> (usize, Vec<Suggestion>) {
    let cfg = &watchlist.maintenance;
    let mut analyzed = 0;
    let mut suggestions = Vec::new();

    for (kind, id, entry) in ledger.all_entries() {
        let Some(tier) = tier_of(watchlist, kind, id) else {
            continue;
        };
        if entry.attempts >= cfg.min_attempts {
            analyzed += 1;
        }
        let protected = tier.is_protected();
        let Some(classification) = classify(entry, protected, cfg) else {
            continue;
        };
        let avg = entry.avg_engagement();
        let hit_rate = entry.hit_rate();
        let (action, to_tier, reason) = match classification {
            Classification::Dead => (
                SuggestedAction::Remove,
                None,
                format!(
                    "hit_rate={:.0}%, consecutive_failures={}",
                    hit_rate * 100.0,
                    entry.consecutive_failures
                ),
            ),
            Classification::Struggling => (
                SuggestedAction::ConsiderRemove,
                None,
                format!("avg_engagement={avg:.1} over {} attempts", entry.attempts),
            ),
            Classification::Star => (
                SuggestedAction::Promote,
                Some(tier.promotion_target().to_string()),
                format!("avg_engagement={avg:.1}"),
            ),
        };
        suggestions.push(Suggestion {
            classification,
            action,
            kind,
            target: id.clone(),
            tier: tier.label(),
            to_tier,
            protected,
            attempts: entry.attempts,
            hit_rate,
            consecutive_failures: entry.consecutive_failures,
            avg_engagement: avg,
            reason,
        });
    }
    (analyzed, suggestions)
}

/// Remove dead entities from non-protected tiers. Each entity leaves exactly
/// the tier it was classified in.
fn apply_removals(watchlist: &mut Watchlist, suggestions: &[Suggestion]) -> Vec<AppliedAction> {
    let mut taken = Vec::new();
    for s in suggestions
        .iter()
        .filter(|s| s.classification == Classification::Dead && !s.protected)
    {
        let removed = match tier_of(watchlist, s.kind, &s.target) {
            Some(EntityTier::Keyword(tier)) if !tier.is_protected() => {
                watchlist.remove_keyword_from(&s.target, tier)
            }
            Some(EntityTier::Account(tier)) if !tier.is_protected() => {
                watchlist.remove_account_from(&s.target, &tier)
            }
            _ => false,
        };
        if removed {
            tracing::info!(kind = s.kind.label(), target = %s.target, tier = %s.tier, "removed dead entity");
            taken.push(AppliedAction {
                action: "removed".to_string(),
                kind: s.kind,
                target: s.target.clone(),
                tier: s.tier.clone(),
            });
        }
    }
    taken
}

fn unresolved_count(watchlist: &Watchlist) -> usize {
    watchlist
        .accounts
        .discovered
        .iter()
        .filter(|c| c.is_unresolved())
        .count()
}

/// Analyze, optionally apply, then persist the watchlist (if changed), the
/// ledger's last-maintain stamp and the JSON report.
pub fn run(
    paths: &ScoutPaths,
    watchlist: &mut Watchlist,
    ledger: &mut MetricsLedger,
    collector: Option<&dyn Collector>,
    apply: bool,
    now: u64,
) -> Result<MaintenanceOutcome> {
    let (analyzed, suggestions) = analyze(ledger, watchlist);

    let mut actions_taken = Vec::new();
    let mut resolution = None;
    if apply {
        actions_taken = apply_removals(watchlist, &suggestions);
    }
    if let Some(collector) = collector {
        let cap = watchlist.discovery.resolve_per_maintain;
        resolution = Some(discovery::resolve_discovered(watchlist, collector, cap));
    }
    let watchlist_changed =
        !actions_taken.is_empty() || resolution.as_ref().is_some_and(ResolutionOutcome::changed);

    let report = MaintenanceReport {
        timestamp_epoch_secs: now,
        mode: if apply { "apply" } else { "dry-run" }.to_string(),
        analyzed,
        suggestions,
        actions_taken,
        resolution,
        unresolved_discovered: unresolved_count(watchlist),
    };

    if watchlist_changed {
        watchlist::save_watchlist(paths, watchlist)?;
    }
    ledger.last_maintain_epoch_secs = Some(now);
    metrics::save(paths, ledger)?;

    let report_file = paths.reports_dir.join(format!("maintain-{now}.json"));
    write_json_atomic(&report_file, &report)
        .with_context(|| format!("failed to write {}", report_file.display()))?;

    tracing::info!(
        mode = %report.mode,
        analyzed,
        dead = report.count(Classification::Dead),
        struggling = report.count(Classification::Struggling),
        stars = report.count(Classification::Star),
        removed = report.actions_taken.len(),
        "maintenance complete"
    );
    audit::record(
        paths,
        "maintain",
        "ok",
        &format!(
            "mode={} suggestions={} removed={} report={}",
            report.mode,
            report.suggestions.len(),
            report.actions_taken.len(),
            report_file.display()
        ),
    );

    Ok(MaintenanceOutcome {
        report,
        report_file,
        watchlist_changed,
    })
}
