use crate::commands::{CommandReport, open_session};
use crate::scout::audit;
use crate::scout::collector::build_collector;
use crate::scout::lock;
use crate::scout::paths::resolve_paths;
use crate::scout::patrol::{self, Pacer, PatrolOptions, SourceMode, SourceSummary};
use crate::scout::sink::{MarkdownSink, Sink};
use crate::scout::util::now_epoch_secs;
use anyhow::Result;

#[derive(Debug, Clone, Copy)]
pub struct PatrolCommandOptions {
    pub label: &'static str,
    pub sources: PatrolOptions,
}

impl PatrolCommandOptions {
    pub fn full() -> Self {
        Self {
            label: "patrol",
            sources: PatrolOptions::full(),
        }
    }

    pub fn keywords_only(all: bool) -> Self {
        Self {
            label: "keywords",
            sources: PatrolOptions {
                keywords: if all { SourceMode::ForceAll } else { SourceMode::Rotate },
                accounts: SourceMode::Skip,
            },
        }
    }

    pub fn accounts_only(all: bool) -> Self {
        Self {
            label: "accounts",
            sources: PatrolOptions {
                keywords: SourceMode::Skip,
                accounts: if all { SourceMode::ForceAll } else { SourceMode::Rotate },
            },
        }
    }
}

fn describe_source(report: &mut CommandReport, src: &SourceSummary) {
    let prefix = &src.source;
    report.detail(format!(
        "{prefix}.mode={} selected={} visited={} hits={} misses={} next_cursor={}",
        src.mode, src.selected, src.visited, src.hits, src.misses, src.next_cursor
    ));
    report.detail(format!(
        "{prefix}.items fetched={} kept={} excluded={} dedup_dropped={} threads={}",
        src.items_fetched, src.kept, src.excluded, src.dedup_dropped, src.threads_expanded
    ));
    if src.errors > 0 {
        report.warning(format!("{prefix}.errors={}", src.errors));
    }
    if let Some(kind) = src.outage {
        report.warning(format!(
            "{prefix}.outage={} abandoned={}",
            kind.as_str(),
            src.abandoned
        ));
        match &src.fallback_feed {
            Some(feed) => report.detail(format!(
                "{prefix}.fallback={feed} kept={}",
                src.fallback_kept
            )),
            None => report.warning(format!("{prefix}.fallback=none")),
        }
    }
}

pub fn run(opts: &PatrolCommandOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new(opts.label);
    let paths = resolve_paths()?;
    let _lock = lock::acquire(&paths)?;
    let mut session = open_session(&paths, &mut report, true)?;

    let collector = build_collector(&session.watchlist)?;
    let mut pacer = Pacer::new(patrol::request_delay(&session.watchlist));
    let now = now_epoch_secs()?;

    // An upstream auth rejection on the first call returns here, before any
    // store is written.
    let outcome = patrol::run_cycle(
        &mut session.watchlist,
        &mut session.state,
        &mut session.ledger,
        collector.as_ref(),
        &mut pacer,
        opts.sources,
        now,
    )?;

    let sink = MarkdownSink::new(&paths.raw_dir);
    match sink.persist(opts.label, &outcome.items) {
        Ok(Some(path)) => report.detail(format!("raw.file={}", path.display())),
        Ok(None) => report.detail("raw.file=none (no new items)"),
        Err(err) => report.warning(format!("raw.write_failed={err:#}")),
    }

    let watchlist_to_save = outcome.watchlist_changed.then_some(&session.watchlist);
    patrol::persist_cycle(&paths, watchlist_to_save, &session.state, &session.ledger)?;

    let summary = &outcome.summary;
    report.detail(format!("collector={}", summary.collector));
    for src in &summary.sources {
        describe_source(&mut report, src);
    }
    report.detail(format!(
        "kept={} excluded={} dedup_dropped={}",
        summary.kept_total, summary.excluded_total, summary.dedup_dropped_total
    ));
    if !summary.discovery.added.is_empty() {
        report.detail(format!(
            "discovered={}",
            summary.discovery.added.join(",")
        ));
    }
    if !summary.discovery.evicted.is_empty() {
        report.detail(format!(
            "discovered.evicted={}",
            summary.discovery.evicted.join(",")
        ));
    }
    report.detail(format!(
        "seen={} seen.evicted={}",
        summary.seen_size, summary.seen_evicted
    ));

    audit::record(
        &paths,
        opts.label,
        "ok",
        &format!(
            "kept={} excluded={} dedup_dropped={} discovered={}",
            summary.kept_total,
            summary.excluded_total,
            summary.dedup_dropped_total,
            summary.discovery.added.len()
        ),
    );
    report.attach(summary)?;
    Ok(report)
}
