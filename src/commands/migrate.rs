use crate::commands::{CommandReport, open_session};
use crate::scout::lock;
use crate::scout::paths::resolve_paths;
use crate::scout::watchlist::WATCHLIST_SCHEMA_VERSION;
use anyhow::Result;

/// Run pending watchlist schema migrations. Safe to repeat.
pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("migrate");
    let paths = resolve_paths()?;
    let _lock = lock::acquire(&paths)?;
    let session = open_session(&paths, &mut report, true)?;

    if report.details.is_empty() {
        report.detail(format!(
            "watchlist already at schema {WATCHLIST_SCHEMA_VERSION}; nothing to do"
        ));
    }
    report.detail(format!(
        "state.applied_migrations={:?}",
        session.state.applied_migrations
    ));
    report.detail(format!("seen={}", session.state.seen_item_ids.len()));
    Ok(report)
}
