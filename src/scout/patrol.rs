//! One patrol cycle: rotate, collect, filter, dedup, score, discover.
//!
//! The cycle only mutates the in-memory stores handed to it; callers persist
//! them afterwards with [`persist_cycle`], one atomic file at a time.

use crate::error::ScoutError;
use crate::scout::collector::{CollectError, Collector, ErrorKind};
use crate::scout::dedup::{self, SEEN_CAPACITY};
use crate::scout::discovery::{self, DiscoveryOutcome};
use crate::scout::item::Item;
use crate::scout::metrics::{self, MetricsLedger};
use crate::scout::paths::ScoutPaths;
use crate::scout::rotation::{self, RotationMode};
use crate::scout::state::{self, ScheduleState};
use crate::scout::warn::{self, WarnEvent};
use crate::scout::watchlist::{self, EntityKind, Watchlist};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Skip,
    Rotate,
    ForceAll,
}

#[derive(Debug, Clone, Copy)]
pub struct PatrolOptions {
    pub keywords: SourceMode,
    pub accounts: SourceMode,
}

impl PatrolOptions {
    pub fn full() -> Self {
        Self {
            keywords: SourceMode::Rotate,
            accounts: SourceMode::Rotate,
        }
    }
}

/// Delay between consecutive upstream calls; `SCOUT_REQUEST_DELAY_MS`
/// overrides the watchlist value.
pub fn request_delay(watchlist: &Watchlist) -> Duration {
    let ms = std::env::var("SCOUT_REQUEST_DELAY_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(watchlist.schedule.request_delay_ms);
    Duration::from_millis(ms)
}

/// Spaces out consecutive upstream calls.
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    last_call: Option<Instant>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_call: None,
        }
    }

    pub fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                thread::sleep(self.delay - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceSummary {
    pub source: String,
    pub mode: String,
    pub selected: usize,
    pub visited: usize,
    pub abandoned: usize,
    pub hits: usize,
    pub misses: usize,
    pub errors: usize,
    pub items_fetched: usize,
    pub excluded: usize,
    pub dedup_dropped: usize,
    pub kept: usize,
    pub threads_expanded: usize,
    pub outage: Option<ErrorKind>,
    pub fallback_feed: Option<String>,
    pub fallback_kept: usize,
    pub next_cursor: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSummary {
    pub run_at_epoch_secs: u64,
    pub collector: String,
    pub sources: Vec<SourceSummary>,
    pub kept_total: usize,
    pub excluded_total: usize,
    pub dedup_dropped_total: usize,
    pub discovery: DiscoveryOutcome,
    pub seen_size: usize,
    pub seen_evicted: usize,
}

#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub summary: CycleSummary,
    pub items: Vec<Item>,
    pub watchlist_changed: bool,
}

struct CycleRun<'a> {
    collector: &'a dyn Collector,
    pacer: &'a mut Pacer,
    now: u64,
    calls_made: usize,
    expanded_conversations: BTreeSet<String>,
}

impl CycleRun<'_> {
    fn call<T>(&mut self, f: impl FnOnce(&dyn Collector) -> Result<T, CollectError>) -> Result<T, CollectError> {
        self.pacer.wait();
        self.calls_made += 1;
        f(self.collector)
    }
}

fn mode_label(mode: SourceMode) -> &'static str {
    match mode {
        SourceMode::Skip => "skip",
        SourceMode::Rotate => "rotate",
        SourceMode::ForceAll => "all",
    }
}

fn warn_collect_failure(kind: EntityKind, entity: &str, collector: &str, err: &CollectError, retry: &str) {
    warn::emit(WarnEvent {
        code: "COLLECT_FAILED",
        stage: "patrol",
        action: kind.label(),
        entity,
        source: collector,
        retry,
        reason: err.kind().as_str(),
        err: &err.to_string(),
    });
}

/// Run one cycle. Fails only when the very first upstream call of the run is
/// rejected for credentials and no fallback feed exists, in which case the
/// caller must not persist anything.
pub fn run_cycle(
    watchlist: &mut Watchlist,
    state: &mut ScheduleState,
    ledger: &mut MetricsLedger,
    collector: &dyn Collector,
    pacer: &mut Pacer,
    opts: PatrolOptions,
    now: u64,
) -> Result<CycleOutcome, ScoutError> {
    let mut run = CycleRun {
        collector,
        pacer,
        now,
        calls_made: 0,
        expanded_conversations: BTreeSet::new(),
    };
    let mut summary = CycleSummary {
        run_at_epoch_secs: now,
        collector: collector.name().to_string(),
        ..CycleSummary::default()
    };
    let mut kept_items = Vec::new();

    for (kind, mode) in [
        (EntityKind::Keyword, opts.keywords),
        (EntityKind::Account, opts.accounts),
    ] {
        if mode == SourceMode::Skip {
            continue;
        }
        let (source_summary, items) = patrol_source(kind, mode, watchlist, state, ledger, &mut run)?;
        tracing::info!(
            source = %source_summary.source,
            visited = source_summary.visited,
            kept = source_summary.kept,
            excluded = source_summary.excluded,
            dedup_dropped = source_summary.dedup_dropped,
            errors = source_summary.errors,
            outage = ?source_summary.outage,
            "source patrolled"
        );
        summary.sources.push(source_summary);
        kept_items.extend(items);
    }

    let weights = watchlist.engagement;
    summary.discovery = discovery::discover(&kept_items, watchlist, &weights);

    summary.seen_evicted = state.seen_item_ids.truncate_oldest(SEEN_CAPACITY);
    summary.seen_size = state.seen_item_ids.len();
    state.last_run_epoch_secs = Some(now);

    summary.kept_total = kept_items.len();
    summary.excluded_total = summary.sources.iter().map(|s| s.excluded).sum();
    summary.dedup_dropped_total = summary.sources.iter().map(|s| s.dedup_dropped).sum();

    tracing::info!(
        kept = summary.kept_total,
        excluded = summary.excluded_total,
        dedup_dropped = summary.dedup_dropped_total,
        discovered = summary.discovery.added.len(),
        seen = summary.seen_size,
        "patrol cycle complete"
    );

    Ok(CycleOutcome {
        watchlist_changed: summary.discovery.changed(),
        summary,
        items: kept_items,
    })
}

fn patrol_source(
    kind: EntityKind,
    mode: SourceMode,
    watchlist: &Watchlist,
    state: &mut ScheduleState,
    ledger: &mut MetricsLedger,
    run: &mut CycleRun<'_>,
) -> Result<(SourceSummary, Vec<Item>), ScoutError> {
    let (fixed, pool, cursor, quota, fallback, limit) = match kind {
        EntityKind::Keyword => (
            watchlist.keywords.core.clone(),
            watchlist.keywords.trending.clone(),
            state.keyword_cursor,
            watchlist.schedule.keywords_per_run,
            watchlist.fallback.keywords_feed.clone(),
            watchlist.schedule.search_limit,
        ),
        EntityKind::Account => (
            watchlist.accounts.tier1.clone(),
            watchlist.tier2_pool(),
            state.account_cursor,
            watchlist.schedule.accounts_per_run,
            watchlist.fallback.accounts_feed.clone(),
            watchlist.schedule.source_limit,
        ),
    };
    let rotation_mode = match mode {
        SourceMode::ForceAll => RotationMode::ForceAll,
        _ => RotationMode::Rotate { quota },
    };
    let selection = rotation::select_with_mode(&pool, cursor, rotation_mode);
    let start = rotation::normalize_cursor(cursor, pool.len());

    let mut entities = fixed;
    let fixed_len = entities.len();
    entities.extend(selection.selected.iter().cloned());

    let mut summary = SourceSummary {
        source: match kind {
            EntityKind::Keyword => "keywords".to_string(),
            EntityKind::Account => "accounts".to_string(),
        },
        mode: mode_label(mode).to_string(),
        selected: entities.len(),
        ..SourceSummary::default()
    };
    let mut kept_items = Vec::new();
    let exclude = watchlist.filters.exclude_keywords.clone();

    for (idx, entity) in entities.iter().enumerate() {
        tracing::debug!(kind = kind.label(), entity = %entity, "querying collector");
        let result = run.call(|c| match kind {
            EntityKind::Keyword => c.search(entity, limit),
            EntityKind::Account => c.fetch_by_source(entity, limit),
        });

        let items = match result {
            Ok(items) => items,
            Err(err) => {
                if run.calls_made == 1
                    && err.kind() == ErrorKind::AuthFailure
                    && fallback.is_none()
                {
                    return Err(ScoutError::UpstreamAuth(err.to_string()));
                }
                ledger.record_failure(kind, entity, err.kind().as_str(), run.now);
                summary.visited += 1;
                summary.misses += 1;
                summary.errors += 1;

                if idx == 0 && err.signals_outage() {
                    summary.outage = Some(err.kind());
                    summary.abandoned = entities.len() - 1;
                    warn_collect_failure(kind, entity, run.collector.name(), &err, "source-abandoned");
                    if let Some(feed) = &fallback {
                        summary.fallback_feed = Some(feed.clone());
                        let fallback_items =
                            collect_fallback(kind, feed, limit, &exclude, state, &mut summary, run);
                        summary.fallback_kept = fallback_items.len();
                        kept_items.extend(fallback_items);
                    }
                    break;
                }
                warn_collect_failure(kind, entity, run.collector.name(), &err, "next-cycle");
                continue;
            }
        };

        summary.visited += 1;
        summary.items_fetched += items.len();
        let origin = format!("{}:{entity}", kind.label());
        let items = items
            .into_iter()
            .map(|mut item| {
                item.origin = origin.clone();
                item
            })
            .collect();

        let (items, excluded) = dedup::filter_exclude(items, &exclude);
        let (mut items, dropped) = dedup::dedup(items, &mut state.seen_item_ids);
        summary.excluded += excluded;
        summary.dedup_dropped += dropped;

        if kind == EntityKind::Account && watchlist.schedule.expand_threads {
            summary.threads_expanded +=
                expand_threads(&mut items, watchlist.schedule.thread_limit, &exclude, state, run);
        }

        ledger.record_attempt(kind, entity, &items, &watchlist.engagement, run.now);
        if items.is_empty() {
            summary.misses += 1;
        } else {
            summary.hits += 1;
        }
        summary.kept += items.len();
        kept_items.extend(items);
    }

    // Advance only past pool members that were actually attempted, so an
    // outage does not skip the rest of this cycle's slice.
    let pool_visited = summary.visited.saturating_sub(fixed_len).min(selection.selected.len());
    summary.next_cursor = match mode {
        SourceMode::Rotate if !pool.is_empty() => (start + pool_visited) % pool.len(),
        _ => cursor,
    };
    match kind {
        EntityKind::Keyword => state.keyword_cursor = summary.next_cursor,
        EntityKind::Account => state.account_cursor = summary.next_cursor,
    }

    Ok((summary, kept_items))
}

fn collect_fallback(
    kind: EntityKind,
    feed: &str,
    limit: usize,
    exclude: &[String],
    state: &mut ScheduleState,
    summary: &mut SourceSummary,
    run: &mut CycleRun<'_>,
) -> Vec<Item> {
    match run.call(|c| c.fetch_by_source(feed, limit)) {
        Ok(items) => {
            summary.items_fetched += items.len();
            let origin = format!("fallback:{feed}");
            let items = items
                .into_iter()
                .map(|mut item| {
                    item.origin = origin.clone();
                    item
                })
                .collect();
            let (items, excluded) = dedup::filter_exclude(items, exclude);
            let (items, dropped) = dedup::dedup(items, &mut state.seen_item_ids);
            summary.excluded += excluded;
            summary.dedup_dropped += dropped;
            summary.kept += items.len();
            items
        }
        Err(err) => {
            summary.errors += 1;
            warn_collect_failure(kind, feed, run.collector.name(), &err, "next-cycle");
            Vec::new()
        }
    }
}

/// Attach threads to conversation roots. A root is an item whose
/// `conversation_id` equals its own id; the fetched conversation only counts
/// as a thread when it holds more than one part by the same author.
fn expand_threads(
    items: &mut [Item],
    limit: usize,
    exclude: &[String],
    state: &mut ScheduleState,
    run: &mut CycleRun<'_>,
) -> usize {
    let mut expanded = 0;
    for item in items.iter_mut() {
        let Some(conv) = item.conversation_id.clone() else {
            continue;
        };
        if conv != item.id || !run.expanded_conversations.insert(conv.clone()) {
            continue;
        }
        match run.call(|c| c.fetch_thread(&conv, limit)) {
            Ok(parts) => {
                let parts: Vec<Item> = parts
                    .into_iter()
                    .filter(|p| p.has_id())
                    .filter(|p| p.author.is_empty() || p.author == item.author)
                    .filter(|p| !dedup::matches_exclude(&p.text, exclude))
                    .collect();
                if parts.len() <= 1 {
                    continue;
                }
                for part in &parts {
                    state.seen_item_ids.insert(&part.id);
                }
                tracing::debug!(conversation = %conv, parts = parts.len(), "thread detected");
                item.thread = Some(parts);
                expanded += 1;
            }
            Err(err) => {
                warn_collect_failure(EntityKind::Account, &conv, run.collector.name(), &err, "skipped");
            }
        }
    }
    expanded
}

/// Persist each store independently; a failure on one file does not stop the
/// others from being written.
pub fn persist_cycle(
    paths: &ScoutPaths,
    watchlist: Option<&Watchlist>,
    state: &ScheduleState,
    ledger: &MetricsLedger,
) -> Result<()> {
    let mut failures = Vec::new();
    if let Err(err) = state::save(paths, state) {
        failures.push(format!("{err:#}"));
    }
    if let Err(err) = metrics::save(paths, ledger) {
        failures.push(format!("{err:#}"));
    }
    if let Some(watchlist) = watchlist
        && let Err(err) = watchlist::save_watchlist(paths, watchlist)
    {
        failures.push(format!("{err:#}"));
    }
    if failures.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("failed to persist patrol state: {}", failures.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scout::collector::testing::ScriptedCollector;
    use crate::scout::item::Engagement;
    use crate::scout::watchlist::AccountTier;

    fn item(id: &str, author: &str, text: &str) -> Item {
        Item {
            id: id.to_string(),
            author: author.to_string(),
            text: text.to_string(),
            ..Item::default()
        }
    }

    fn watchlist() -> Watchlist {
        let mut w = Watchlist::default();
        w.keywords.core = vec!["core".to_string()];
        w.keywords.trending = ["t1", "t2", "t3"].iter().map(|s| s.to_string()).collect();
        w.accounts.tier1 = vec!["alice".to_string()];
        w.accounts.tier2.insert(
            "builders".to_string(),
            ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect(),
        );
        w.schedule.keywords_per_run = 2;
        w.schedule.accounts_per_run = 2;
        w.schedule.request_delay_ms = 0;
        w
    }

    fn run(
        w: &mut Watchlist,
        state: &mut ScheduleState,
        ledger: &mut MetricsLedger,
        collector: &ScriptedCollector,
        opts: PatrolOptions,
    ) -> Result<CycleOutcome, ScoutError> {
        let mut pacer = Pacer::new(Duration::ZERO);
        run_cycle(w, state, ledger, collector, &mut pacer, opts, 1_000)
    }

    #[test]
    fn visits_fixed_tiers_plus_rotating_slice() {
        let mut w = watchlist();
        let mut state = ScheduleState::default();
        let mut ledger = MetricsLedger::default();
        let collector = ScriptedCollector::default();

        let outcome = run(&mut w, &mut state, &mut ledger, &collector, PatrolOptions::full())
            .expect("cycle");
        let calls = collector.calls.borrow().clone();
        assert_eq!(
            calls,
            vec![
                "search:core",
                "search:t1",
                "search:t2",
                "source:alice",
                "source:a",
                "source:b"
            ]
        );
        assert_eq!(state.keyword_cursor, 2);
        assert_eq!(state.account_cursor, 2);
        assert_eq!(outcome.summary.sources.len(), 2);
        assert_eq!(state.last_run_epoch_secs, Some(1_000));
    }

    #[test]
    fn force_all_visits_whole_pool_without_moving_cursor() {
        let mut w = watchlist();
        let mut state = ScheduleState {
            account_cursor: 3,
            ..ScheduleState::default()
        };
        let mut ledger = MetricsLedger::default();
        let collector = ScriptedCollector::default();
        let opts = PatrolOptions {
            keywords: SourceMode::Skip,
            accounts: SourceMode::ForceAll,
        };
        run(&mut w, &mut state, &mut ledger, &collector, opts).expect("cycle");
        assert_eq!(collector.calls.borrow().len(), 6);
        assert_eq!(state.account_cursor, 3);
        assert_eq!(state.keyword_cursor, 0);
    }

    #[test]
    fn excluded_and_duplicate_items_never_reach_the_ledger() {
        let mut w = watchlist();
        w.filters.exclude_keywords = vec!["SPAM".to_string()];
        let mut state = ScheduleState::default();
        state.seen_item_ids.insert("old");
        let mut ledger = MetricsLedger::default();
        let collector = ScriptedCollector::default();
        collector.respond(
            "search:core",
            Ok(vec![
                item("1", "x", "fresh"),
                item("2", "x", "buy spam now"),
                item("old", "x", "seen before"),
                item("1", "x", "dup in batch"),
            ]),
        );
        collector.respond("search:t1", Ok(vec![item("2", "x", "clean text, same id")]));
        let opts = PatrolOptions {
            keywords: SourceMode::Rotate,
            accounts: SourceMode::Skip,
        };
        let outcome = run(&mut w, &mut state, &mut ledger, &collector, opts).expect("cycle");

        let ids: Vec<&str> = outcome.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        let src = &outcome.summary.sources[0];
        assert_eq!(src.excluded, 1);
        assert_eq!(src.dedup_dropped, 2);
        assert_eq!(outcome.items[0].origin, "keyword:core");
        assert_eq!(ledger.get(EntityKind::Keyword, "core").expect("core").total_items, 1);
        assert_eq!(ledger.get(EntityKind::Keyword, "t2").expect("t2").misses, 1);
    }

    #[test]
    fn ids_are_not_resurfaced_in_the_next_cycle() {
        let mut w = watchlist();
        let mut state = ScheduleState::default();
        let mut ledger = MetricsLedger::default();
        let opts = PatrolOptions {
            keywords: SourceMode::Skip,
            accounts: SourceMode::Rotate,
        };
        let collector = ScriptedCollector::default();
        collector.respond("source:alice", Ok(vec![item("p1", "alice", "hello")]));
        collector.respond("source:alice", Ok(vec![item("p1", "alice", "hello")]));

        let first = run(&mut w, &mut state, &mut ledger, &collector, opts).expect("first");
        let second = run(&mut w, &mut state, &mut ledger, &collector, opts).expect("second");
        assert_eq!(first.items.len(), 1);
        assert!(second.items.is_empty());
        let alice = ledger.get(EntityKind::Account, "alice").expect("alice");
        assert_eq!((alice.hits, alice.misses), (1, 1));
    }

    #[test]
    fn first_query_outage_abandons_source_and_uses_fallback() {
        let mut w = watchlist();
        w.fallback.accounts_feed = Some("home-feed".to_string());
        let mut state = ScheduleState::default();
        let mut ledger = MetricsLedger::default();
        let collector = ScriptedCollector::default();
        collector.respond(
            "source:alice",
            Err(CollectError::Transport("503".to_string())),
        );
        collector.respond("source:home-feed", Ok(vec![item("f1", "zed", "from feed")]));
        let opts = PatrolOptions {
            keywords: SourceMode::Skip,
            accounts: SourceMode::Rotate,
        };
        let outcome = run(&mut w, &mut state, &mut ledger, &collector, opts).expect("cycle");

        assert_eq!(
            collector.calls.borrow().clone(),
            vec!["source:alice", "source:home-feed"]
        );
        let src = &outcome.summary.sources[0];
        assert_eq!(src.outage, Some(ErrorKind::Transport));
        assert_eq!(src.abandoned, 2);
        assert_eq!(src.fallback_kept, 1);
        assert_eq!(outcome.items[0].origin, "fallback:home-feed");
        assert!(ledger.get(EntityKind::Account, "a").is_none());
        assert_eq!(ledger.get(EntityKind::Account, "alice").expect("alice").misses, 1);
        // the rotating slice was not attempted, so the cursor stays put
        assert_eq!(state.account_cursor, 0);
    }

    #[test]
    fn later_failures_are_misses_and_the_cycle_continues() {
        let mut w = watchlist();
        let mut state = ScheduleState::default();
        let mut ledger = MetricsLedger::default();
        let collector = ScriptedCollector::default();
        collector.respond("source:a", Err(CollectError::Timeout(60)));
        collector.respond("source:b", Ok(vec![item("b1", "b", "post")]));
        let opts = PatrolOptions {
            keywords: SourceMode::Skip,
            accounts: SourceMode::Rotate,
        };
        let outcome = run(&mut w, &mut state, &mut ledger, &collector, opts).expect("cycle");
        let src = &outcome.summary.sources[0];
        assert_eq!(src.errors, 1);
        assert!(src.outage.is_none());
        assert_eq!(src.visited, 3);
        let a = ledger.get(EntityKind::Account, "a").expect("a");
        assert_eq!(a.last_error.as_deref(), Some("timeout"));
        assert_eq!(state.account_cursor, 2);
    }

    #[test]
    fn auth_failure_on_first_call_without_fallback_is_fatal() {
        let mut w = watchlist();
        let mut state = ScheduleState::default();
        let mut ledger = MetricsLedger::default();
        let collector = ScriptedCollector::default();
        collector.respond(
            "search:core",
            Err(CollectError::AuthFailure("401".to_string())),
        );
        let err = run(&mut w, &mut state, &mut ledger, &collector, PatrolOptions::full())
            .expect_err("fatal");
        assert!(matches!(err, ScoutError::UpstreamAuth(_)));
        assert!(ledger.keywords.is_empty());
    }

    #[test]
    fn threads_are_attached_and_their_ids_marked_seen() {
        let mut w = watchlist();
        let mut state = ScheduleState::default();
        let mut ledger = MetricsLedger::default();
        let collector = ScriptedCollector::default();
        let mut root = item("r1", "alice", "1/ a thread");
        root.conversation_id = Some("r1".to_string());
        let mut reply = item("x9", "alice", "a reply elsewhere");
        reply.conversation_id = Some("other".to_string());
        collector.respond("source:alice", Ok(vec![root, reply]));
        collector.respond(
            "thread:r1",
            Ok(vec![
                item("r1", "alice", "1/"),
                item("r2", "alice", "2/"),
                item("q1", "mallory", "quote"),
            ]),
        );
        let opts = PatrolOptions {
            keywords: SourceMode::Skip,
            accounts: SourceMode::Rotate,
        };
        let outcome = run(&mut w, &mut state, &mut ledger, &collector, opts).expect("cycle");
        let src = &outcome.summary.sources[0];
        assert_eq!(src.threads_expanded, 1);
        let thread = outcome.items[0].thread.as_ref().expect("thread");
        assert_eq!(thread.len(), 2);
        assert!(state.seen_item_ids.contains("r2"));
        assert!(!state.seen_item_ids.contains("q1"));
        assert!(!collector.calls.borrow().iter().any(|c| c == "thread:other"));
    }

    #[test]
    fn discovery_feeds_the_watchlist() {
        let mut w = watchlist();
        let mut state = ScheduleState::default();
        let mut ledger = MetricsLedger::default();
        let collector = ScriptedCollector::default();
        let mut viral = item("v1", "newcomer", "viral");
        viral.engagement = Engagement {
            likes: 5_000,
            ..Engagement::default()
        };
        collector.respond("search:core", Ok(vec![viral]));
        let outcome = run(&mut w, &mut state, &mut ledger, &collector, PatrolOptions::full())
            .expect("cycle");
        assert!(outcome.watchlist_changed);
        assert_eq!(w.account_tier("newcomer"), Some(AccountTier::Discovered));
    }

    #[test]
    fn excluded_thread_parts_are_dropped() {
        let mut w = watchlist();
        w.filters.exclude_keywords = vec!["giveaway".to_string()];
        let mut state = ScheduleState::default();
        let mut ledger = MetricsLedger::default();
        let collector = ScriptedCollector::default();
        let mut root = item("r1", "alice", "1/ a thread");
        root.conversation_id = Some("r1".to_string());
        collector.respond("source:alice", Ok(vec![root]));
        collector.respond(
            "thread:r1",
            Ok(vec![
                item("r1", "alice", "1/"),
                item("r2", "alice", "2/ join the GIVEAWAY"),
                item("r3", "alice", "3/"),
            ]),
        );
        let opts = PatrolOptions {
            keywords: SourceMode::Skip,
            accounts: SourceMode::Rotate,
        };
        let outcome = run(&mut w, &mut state, &mut ledger, &collector, opts).expect("cycle");
        let thread = outcome.items[0].thread.as_ref().expect("thread");
        let ids: Vec<&str> = thread.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r3"]);
        assert!(!state.seen_item_ids.contains("r2"));
    }

    #[test]
    fn tracked_accounts_are_not_rediscovered_under_their_numeric_id() {
        let mut w = watchlist();
        let mut state = ScheduleState::default();
        let mut ledger = MetricsLedger::default();
        let collector = ScriptedCollector::default();
        let mut own = item("p1", "4242", "big launch");
        own.engagement = Engagement {
            likes: 5_000,
            ..Engagement::default()
        };
        collector.respond("source:alice", Ok(vec![own]));
        let opts = PatrolOptions {
            keywords: SourceMode::Skip,
            accounts: SourceMode::Rotate,
        };
        let outcome = run(&mut w, &mut state, &mut ledger, &collector, opts).expect("cycle");
        assert_eq!(outcome.items.len(), 1);
        assert!(outcome.summary.discovery.added.is_empty());
        assert!(w.accounts.discovered.is_empty());
        assert!(!outcome.watchlist_changed);
    }

    #[test]
    fn seen_set_is_capped_after_the_cycle() {
        let mut w = watchlist();
        let mut state = ScheduleState::default();
        for i in 0..SEEN_CAPACITY {
            state.seen_item_ids.insert(&format!("old-{i}"));
        }
        let mut ledger = MetricsLedger::default();
        let collector = ScriptedCollector::default();
        collector.respond(
            "search:core",
            Ok((0..10).map(|i| item(&format!("new-{i}"), "x", "")).collect()),
        );
        let outcome = run(&mut w, &mut state, &mut ledger, &collector, PatrolOptions::full())
            .expect("cycle");
        assert_eq!(state.seen_item_ids.len(), SEEN_CAPACITY);
        assert_eq!(outcome.summary.seen_evicted, 10);
        assert!(!state.seen_item_ids.contains("old-0"));
        assert!(state.seen_item_ids.contains("new-9"));
    }
}
