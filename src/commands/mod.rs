pub mod health;
pub mod maintain;
pub mod migrate;
pub mod patrol;
pub mod search;
pub mod status;
pub mod watchlist_edit;

use crate::scout::metrics::{self, MetricsLedger};
use crate::scout::migrate as schema;
use crate::scout::paths::ScoutPaths;
use crate::scout::state::{self, ScheduleState};
use crate::scout::watchlist::{self, LoadedWatchlist, Watchlist};
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            warnings: Vec::new(),
            data: None,
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    /// Warnings are reported but never change the exit code.
    pub fn warning(&mut self, text: impl Into<String>) {
        self.warnings.push(text.into());
    }

    pub fn attach<T: Serialize>(&mut self, data: &T) -> Result<()> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(())
    }
}

/// Stores loaded for one command.
pub struct Session {
    pub paths: ScoutPaths,
    pub watchlist: Watchlist,
    pub state: ScheduleState,
    pub ledger: MetricsLedger,
    pub migration_pending: bool,
}

/// Load the watchlist, state and ledger. Writers run pending schema
/// migrations first; readers only report them.
pub fn open_session(paths: &ScoutPaths, report: &mut CommandReport, writable: bool) -> Result<Session> {
    let mut loaded: LoadedWatchlist = watchlist::load_watchlist(paths)?;
    let mut state = state::load(paths)?;
    let mut migration_pending = false;

    if let Some(from) = loaded.migrated_from {
        if writable {
            if let Some(message) = schema::apply_pending(paths, &mut loaded, &mut state)? {
                report.detail(format!("migration={message}"));
            }
        } else {
            migration_pending = true;
            report.warning(format!(
                "watchlist uses schema {from}; run `scout migrate` to upgrade it"
            ));
        }
    }

    let ledger = metrics::load(paths)?;
    Ok(Session {
        paths: paths.clone(),
        watchlist: loaded.watchlist,
        state,
        ledger,
        migration_pending,
    })
}
