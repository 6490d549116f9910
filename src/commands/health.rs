use crate::commands::{CommandReport, open_session};
use crate::scout::health;
use crate::scout::paths::resolve_paths;
use crate::scout::util::now_epoch_secs;
use anyhow::Result;

/// Always carries the snapshot as JSON data, whatever the output mode.
pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("health");
    let paths = resolve_paths()?;
    let session = open_session(&paths, &mut report, false)?;
    let snapshot = health::snapshot(
        &session.watchlist,
        &session.state,
        &session.ledger,
        session.migration_pending,
        now_epoch_secs()?,
    );
    if snapshot.needs_maintain {
        report.detail("needs_maintain=true");
    }
    report.attach(&snapshot)?;
    Ok(report)
}
