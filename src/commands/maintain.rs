use crate::commands::{CommandReport, open_session};
use crate::scout::collector::{Collector, build_collector};
use crate::scout::lock;
use crate::scout::maintenance::{self, Classification};
use crate::scout::paths::resolve_paths;
use crate::scout::util::now_epoch_secs;
use anyhow::Result;

#[derive(Debug, Clone, Default)]
pub struct MaintainOptions {
    pub apply: bool,
}

pub fn run(opts: &MaintainOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("maintain");
    let paths = resolve_paths()?;
    let _lock = lock::acquire(&paths)?;
    let mut session = open_session(&paths, &mut report, true)?;

    if session.ledger.keywords.is_empty() && session.ledger.accounts.is_empty() {
        report.warning("no metrics yet; run a few patrols before judging the watchlist");
    }

    let needs_resolution = session
        .watchlist
        .accounts
        .discovered
        .iter()
        .any(|c| c.is_unresolved());
    let collector: Option<Box<dyn Collector>> = if needs_resolution {
        match build_collector(&session.watchlist) {
            Ok(collector) => Some(collector),
            Err(err) => {
                report.warning(format!("id resolution skipped: {err:#}"));
                None
            }
        }
    } else {
        None
    };

    let outcome = maintenance::run(
        &paths,
        &mut session.watchlist,
        &mut session.ledger,
        collector.as_deref(),
        opts.apply,
        now_epoch_secs()?,
    )?;
    let r = &outcome.report;

    report.detail(format!("mode={} analyzed={}", r.mode, r.analyzed));
    report.detail(format!(
        "dead={} struggling={} stars={}",
        r.count(Classification::Dead),
        r.count(Classification::Struggling),
        r.count(Classification::Star)
    ));
    for s in &r.suggestions {
        let protected = if s.protected { " protected" } else { "" };
        let to = s
            .to_tier
            .as_deref()
            .map(|t| format!(" -> {t}"))
            .unwrap_or_default();
        report.detail(format!(
            "suggest {} {}:{} [{}{protected}]{to} {}",
            s.action.label(),
            s.kind.label(),
            s.target,
            s.tier,
            s.reason
        ));
    }
    for a in &r.actions_taken {
        report.detail(format!("{} {}:{} from {}", a.action, a.kind.label(), a.target, a.tier));
    }
    if let Some(res) = &r.resolution {
        for (id, handle) in &res.resolved {
            report.detail(format!("resolved {id} -> @{handle}"));
        }
        for (id, handle) in &res.merged {
            report.detail(format!("merged {id} into tracked @{handle}"));
        }
    }
    if r.unresolved_discovered > 0 {
        report.detail(format!("discovered.unresolved={}", r.unresolved_discovered));
    }
    if !opts.apply && r.count(Classification::Dead) > 0 {
        report.detail("dry-run: pass --apply to remove dead entities from non-protected tiers");
    }
    report.detail(format!("report.file={}", outcome.report_file.display()));
    report.attach(r)?;
    Ok(report)
}
