use crate::commands::{CommandReport, open_session};
use crate::scout::audit;
use crate::scout::lock;
use crate::scout::paths::resolve_paths;
use crate::scout::watchlist::{self, AccountTier, KeywordTier, normalize_handle};
use anyhow::Result;

#[derive(Debug, Clone)]
pub enum Edit {
    AddKeyword { text: String, tier: KeywordTier },
    RemoveKeyword { text: String },
    AddAccount { handle: String, tier: AccountTier },
    RemoveAccount { handle: String },
}

impl Edit {
    fn command_name(&self) -> &'static str {
        match self {
            Edit::AddKeyword { .. } => "add-keyword",
            Edit::RemoveKeyword { .. } => "remove-keyword",
            Edit::AddAccount { .. } => "add-account",
            Edit::RemoveAccount { .. } => "remove-account",
        }
    }
}

/// Apply one membership change and rewrite the watchlist atomically.
/// Duplicates and unknown entries are reported, not treated as failures.
pub fn run(edit: &Edit) -> Result<CommandReport> {
    let name = edit.command_name();
    let mut report = CommandReport::new(name);
    let paths = resolve_paths()?;
    let _lock = lock::acquire(&paths)?;
    let mut session = open_session(&paths, &mut report, true)?;
    let w = &mut session.watchlist;

    let change = match edit {
        Edit::AddKeyword { text, tier } => {
            if w.add_keyword(text, *tier) {
                Some(format!("added keyword `{}` to {}", text.trim(), tier.label()))
            } else if let Some(existing) = w.keyword_tier(text.trim()) {
                report.warning(format!("keyword `{}` already tracked in {}", text.trim(), existing.label()));
                None
            } else {
                report.warning("keyword is empty");
                None
            }
        }
        Edit::RemoveKeyword { text } => match w.remove_keyword(text.trim()) {
            Some(tier) => Some(format!("removed keyword `{}` from {}", text.trim(), tier.label())),
            None => {
                report.warning(format!("keyword `{}` not found", text.trim()));
                None
            }
        },
        Edit::AddAccount { handle, tier } => {
            let handle = normalize_handle(handle);
            if w.add_account(&handle, tier) {
                Some(format!("added @{handle} to {tier}"))
            } else if let Some(existing) = w.account_tier(&handle) {
                report.warning(format!("@{handle} already tracked in {existing}"));
                None
            } else {
                report.warning("account handle is empty");
                None
            }
        }
        Edit::RemoveAccount { handle } => {
            let handle = normalize_handle(handle);
            match w.remove_account(&handle) {
                Some(tier) => Some(format!("removed @{handle} from {tier}")),
                None => {
                    report.warning(format!("@{handle} not found"));
                    None
                }
            }
        }
    };

    if let Some(message) = change {
        watchlist::save_watchlist(&paths, w)?;
        tracing::info!(command = name, "{message}");
        audit::record(&paths, name, "ok", &message);
        report.detail(message);
        report.detail(format!("watchlist.file={}", paths.watchlist_file.display()));
    }
    Ok(report)
}
