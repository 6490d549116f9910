use crate::commands::{CommandReport, open_session};
use crate::scout::paths::resolve_paths;
use crate::scout::util::format_epoch;
use crate::scout::watchlist::EntityKind;
use anyhow::Result;
use serde::Serialize;

const TOP_ENTITIES: usize = 5;

#[derive(Debug, Serialize)]
struct RankedEntity {
    kind: EntityKind,
    id: String,
    avg_engagement: f64,
    hit_rate: f64,
    attempts: u64,
}

fn preview(list: &[String]) -> String {
    let shown: Vec<&str> = list.iter().take(TOP_ENTITIES).map(String::as_str).collect();
    let more = if list.len() > TOP_ENTITIES { ", ..." } else { "" };
    format!("{}{more}", shown.join(", "))
}

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("status");
    let paths = resolve_paths()?;
    let session = open_session(&paths, &mut report, false)?;
    let w = &session.watchlist;
    let state = &session.state;
    let ledger = &session.ledger;

    report.detail(format!("scout_home={}", paths.scout_home.display()));
    report.detail(format!("watchlist.file={}", paths.watchlist_file.display()));
    report.detail(format!(
        "keywords.core={} [{}]",
        w.keywords.core.len(),
        preview(&w.keywords.core)
    ));
    report.detail(format!(
        "keywords.trending={} next_cursor={}",
        w.keywords.trending.len(),
        state.keyword_cursor
    ));
    report.detail(format!(
        "accounts.tier1={} [{}]",
        w.accounts.tier1.len(),
        preview(&w.accounts.tier1)
    ));
    for (group, handles) in &w.accounts.tier2 {
        report.detail(format!("accounts.tier2.{group}={}", handles.len()));
    }
    report.detail(format!(
        "accounts.tier2_pool={} next_cursor={}",
        w.tier2_pool().len(),
        state.account_cursor
    ));
    let unresolved = w
        .accounts
        .discovered
        .iter()
        .filter(|c| c.is_unresolved())
        .count();
    report.detail(format!(
        "accounts.discovered={} unresolved={unresolved}",
        w.accounts.discovered.len()
    ));
    report.detail(format!(
        "per_run keywords={} accounts={}",
        w.schedule.keywords_per_run, w.schedule.accounts_per_run
    ));
    report.detail(format!(
        "filters.exclude_keywords={}",
        w.filters.exclude_keywords.len()
    ));
    report.detail(format!("seen={}", state.seen_item_ids.len()));
    report.detail(format!("last_run={}", format_epoch(state.last_run_epoch_secs)));
    report.detail(format!(
        "last_maintain={}",
        format_epoch(ledger.last_maintain_epoch_secs)
    ));

    let mut ranked: Vec<RankedEntity> = ledger
        .all_entries()
        .filter(|(_, _, e)| e.total_items > 0)
        .map(|(kind, id, e)| RankedEntity {
            kind,
            id: id.clone(),
            avg_engagement: e.avg_engagement(),
            hit_rate: e.hit_rate(),
            attempts: e.attempts,
        })
        .collect();
    ranked.sort_by(|a, b| b.avg_engagement.total_cmp(&a.avg_engagement));
    ranked.truncate(TOP_ENTITIES);
    for (rank, entity) in ranked.iter().enumerate() {
        report.detail(format!(
            "top.{}={}:{} avg_engagement={:.1} hit_rate={:.0}%",
            rank + 1,
            entity.kind.label(),
            entity.id,
            entity.avg_engagement,
            entity.hit_rate * 100.0
        ));
    }

    report.attach(&serde_json::json!({
        "keyword_cursor": state.keyword_cursor,
        "account_cursor": state.account_cursor,
        "seen": state.seen_item_ids.len(),
        "last_run_epoch_secs": state.last_run_epoch_secs,
        "last_maintain_epoch_secs": ledger.last_maintain_epoch_secs,
        "top": ranked,
    }))?;
    Ok(report)
}
