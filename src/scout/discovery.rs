use crate::scout::collector::Collector;
use crate::scout::item::{EngagementWeights, Item};
use crate::scout::warn::{self, WarnEvent};
use crate::scout::watchlist::{DiscoveredCandidate, DiscoveryConfig, Watchlist};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryOutcome {
    pub added: Vec<String>,
    pub evicted: Vec<String>,
}

impl DiscoveryOutcome {
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.evicted.is_empty()
    }
}

/// Append and evict from the front until the list fits `cap`.
pub fn push_capped(
    list: &mut Vec<DiscoveredCandidate>,
    candidate: DiscoveredCandidate,
    cap: usize,
) -> Vec<String> {
    list.push(candidate);
    let overflow = list.len().saturating_sub(cap);
    list.drain(..overflow).map(|c| c.id).collect()
}

fn qualifies(item: &Item, cfg: &DiscoveryConfig) -> bool {
    item.engagement.likes >= cfg.min_likes || item.engagement.shares >= cfg.min_shares
}

/// Items pulled from a tracked account's own feed say nothing new about
/// sources, whatever author id the collector reports.
fn from_tracked_account(item: &Item, watchlist: &Watchlist) -> bool {
    item.origin
        .strip_prefix("account:")
        .is_some_and(|handle| watchlist.knows_account(handle))
}

/// Record untracked authors of high-engagement items as discovered candidates.
pub fn discover(
    items: &[Item],
    watchlist: &mut Watchlist,
    weights: &EngagementWeights,
) -> DiscoveryOutcome {
    let mut outcome = DiscoveryOutcome::default();
    if !watchlist.discovery.enabled {
        return outcome;
    }
    let cfg = watchlist.discovery.clone();

    for item in items.iter().filter(|item| qualifies(item, &cfg)) {
        let author = item.author.trim().trim_start_matches('@');
        if author.is_empty()
            || watchlist.knows_account(author)
            || from_tracked_account(item, watchlist)
        {
            continue;
        }
        tracing::info!(author, item = %item.id, likes = item.engagement.likes, "discovered new source");
        let candidate = DiscoveredCandidate {
            id: author.to_string(),
            first_seen_engagement: item.engagement.weighted(weights),
        };
        let evicted = push_capped(&mut watchlist.accounts.discovered, candidate, cfg.max_discovered);
        outcome.added.push(author.to_string());
        outcome.evicted.extend(evicted);
    }
    outcome
        .added
        .retain(|id| watchlist.accounts.discovered.iter().any(|c| &c.id == id));
    outcome
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionOutcome {
    pub resolved: Vec<(String, String)>,
    /// Ids whose handle was already tracked elsewhere; their candidate entry is dropped.
    pub merged: Vec<(String, String)>,
    pub unresolved: Vec<String>,
    pub remaining: usize,
}

impl ResolutionOutcome {
    pub fn changed(&self) -> bool {
        !self.resolved.is_empty() || !self.merged.is_empty()
    }
}

/// Resolve up to `cap` numeric discovered ids to handles. Lookup failures
/// leave the id in place for a later attempt.
pub fn resolve_discovered(
    watchlist: &mut Watchlist,
    collector: &dyn Collector,
    cap: usize,
) -> ResolutionOutcome {
    let mut outcome = ResolutionOutcome::default();
    let pending: Vec<String> = watchlist
        .accounts
        .discovered
        .iter()
        .filter(|c| c.is_unresolved())
        .map(|c| c.id.clone())
        .collect();

    for id in pending.iter().take(cap) {
        match collector.resolve_handle(id) {
            Ok(Some(handle)) => {
                if watchlist.account_tier(&handle).is_some() {
                    watchlist.accounts.discovered.retain(|c| &c.id != id);
                    outcome.merged.push((id.clone(), handle));
                } else if let Some(entry) =
                    watchlist.accounts.discovered.iter_mut().find(|c| &c.id == id)
                {
                    entry.id = handle.clone();
                    outcome.resolved.push((id.clone(), handle));
                }
            }
            Ok(None) => outcome.unresolved.push(id.clone()),
            Err(err) => {
                warn::emit(WarnEvent {
                    code: "RESOLVE_FAILED",
                    stage: "maintain",
                    action: "resolve-handle",
                    entity: id,
                    source: collector.name(),
                    retry: "next-maintain",
                    reason: err.kind().as_str(),
                    err: &err.to_string(),
                });
                outcome.unresolved.push(id.clone());
            }
        }
    }
    outcome.remaining = watchlist
        .accounts
        .discovered
        .iter()
        .filter(|c| c.is_unresolved())
        .count();
    outcome
}
