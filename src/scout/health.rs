use crate::scout::metrics::MetricsLedger;
use crate::scout::state::ScheduleState;
use crate::scout::util::SECS_PER_DAY;
use crate::scout::watchlist::{EntityKind, Watchlist};
use serde::Serialize;
use std::collections::BTreeSet;

/// Machine-readable snapshot consumed by agents deciding what to run next.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub total_accounts: usize,
    pub tier1: usize,
    pub tier2_pool: usize,
    pub discovered: usize,
    pub unresolved_ids: usize,
    pub total_keywords: usize,
    pub core_keywords: usize,
    pub trending_keywords: usize,
    pub account_coverage: f64,
    pub keyword_coverage: f64,
    pub data_coverage: f64,
    pub avg_engagement: f64,
    pub seen_items: usize,
    pub last_run_epoch_secs: Option<u64>,
    pub last_maintain_epoch_secs: Option<u64>,
    pub needs_maintain: bool,
    pub migration_pending: bool,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn coverage<'a>(tracked: impl Iterator<Item = &'a str>, ledger: &MetricsLedger, kind: EntityKind) -> (usize, usize) {
    let tracked: BTreeSet<&str> = tracked.collect();
    let covered = tracked
        .iter()
        .filter(|id| ledger.get(kind, id).is_some_and(|e| e.attempts > 0))
        .count();
    (covered, tracked.len())
}

fn ratio(covered: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(covered as f64 / total as f64)
    }
}

/// Coverage counts patrolled tiers only; discovered candidates are excluded.
pub fn snapshot(
    watchlist: &Watchlist,
    state: &ScheduleState,
    ledger: &MetricsLedger,
    migration_pending: bool,
    now: u64,
) -> HealthSnapshot {
    let tier2_pool = watchlist.tier2_pool();
    let accounts = watchlist
        .accounts
        .tier1
        .iter()
        .chain(tier2_pool.iter())
        .map(String::as_str);
    let keywords = watchlist
        .keywords
        .core
        .iter()
        .chain(watchlist.keywords.trending.iter())
        .map(String::as_str);

    let (acc_covered, acc_total) = coverage(accounts, ledger, EntityKind::Account);
    let (kw_covered, kw_total) = coverage(keywords, ledger, EntityKind::Keyword);

    let averages: Vec<f64> = ledger
        .all_entries()
        .filter(|(_, _, e)| e.total_items > 0)
        .map(|(_, _, e)| e.avg_engagement())
        .collect();
    let avg_engagement = if averages.is_empty() {
        0.0
    } else {
        round2(averages.iter().sum::<f64>() / averages.len() as f64)
    };

    let overdue_after = watchlist
        .maintenance
        .overdue_after_days
        .saturating_mul(SECS_PER_DAY);
    let needs_maintain = match ledger.last_maintain_epoch_secs {
        None => true,
        Some(last) => now.saturating_sub(last) >= overdue_after,
    };

    HealthSnapshot {
        total_accounts: acc_total,
        tier1: watchlist.accounts.tier1.len(),
        tier2_pool: tier2_pool.len(),
        discovered: watchlist.accounts.discovered.len(),
        unresolved_ids: watchlist
            .accounts
            .discovered
            .iter()
            .filter(|c| c.is_unresolved())
            .count(),
        total_keywords: kw_total,
        core_keywords: watchlist.keywords.core.len(),
        trending_keywords: watchlist.keywords.trending.len(),
        account_coverage: ratio(acc_covered, acc_total),
        keyword_coverage: ratio(kw_covered, kw_total),
        data_coverage: ratio(acc_covered + kw_covered, acc_total + kw_total),
        avg_engagement,
        seen_items: state.seen_item_ids.len(),
        last_run_epoch_secs: state.last_run_epoch_secs,
        last_maintain_epoch_secs: ledger.last_maintain_epoch_secs,
        needs_maintain,
        migration_pending,
    }
}
