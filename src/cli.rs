use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::commands;
use crate::commands::maintain::MaintainOptions;
use crate::commands::patrol::PatrolCommandOptions;
use crate::commands::search::SearchOptions;
use crate::commands::watchlist_edit::Edit;
use crate::env_loader::{self, DotenvLoadOutcome};
use crate::logging;
use crate::scout::watchlist::{AccountTier, KeywordTier};

#[derive(Debug, Parser)]
#[command(name = "scout")]
#[command(about = "Watchlist patrol scheduler: rotating collection, dedup, quality metrics, self-maintenance")]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// One full cycle over keywords and accounts.
    Patrol,
    /// Keywords only.
    Keywords(SourceArgs),
    /// Accounts only.
    Accounts(SourceArgs),
    /// Ad-hoc search; no state is changed.
    Search(SearchArgs),
    Status,
    /// Classify entities; `--apply` removes dead ones and resolves ids.
    Maintain(MaintainArgs),
    /// JSON health snapshot.
    Health,
    AddKeyword(AddKeywordArgs),
    RemoveKeyword(RemoveKeywordArgs),
    AddAccount(AddAccountArgs),
    RemoveAccount(RemoveAccountArgs),
    /// Upgrade an older watchlist schema.
    #[command(alias = "migrate-state")]
    Migrate,
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Visit the whole rotating pool without moving the cursor.
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    pub query: String,
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct MaintainArgs {
    #[arg(long)]
    pub apply: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KeywordTierArg {
    Core,
    Trending,
}

impl From<KeywordTierArg> for KeywordTier {
    fn from(arg: KeywordTierArg) -> Self {
        match arg {
            KeywordTierArg::Core => KeywordTier::Core,
            KeywordTierArg::Trending => KeywordTier::Trending,
        }
    }
}

#[derive(Debug, Args)]
pub struct AddKeywordArgs {
    pub keyword: String,
    #[arg(long, value_enum, default_value_t = KeywordTierArg::Trending)]
    pub tier: KeywordTierArg,
}

#[derive(Debug, Args)]
pub struct RemoveKeywordArgs {
    pub keyword: String,
}

#[derive(Debug, Args)]
pub struct AddAccountArgs {
    pub handle: String,
    /// tier1, tier2, tier2:<group> or discovered.
    #[arg(long, default_value = "tier2", value_parser = AccountTier::parse)]
    pub tier: AccountTier,
}

#[derive(Debug, Args)]
pub struct RemoveAccountArgs {
    pub handle: String,
}

fn print_report(report: &commands::CommandReport, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("command: {}", report.command);
    println!("ok: {}", report.ok);
    if !report.details.is_empty() {
        println!("details:");
        for detail in &report.details {
            println!("- {detail}");
        }
    }
    if !report.warnings.is_empty() {
        println!("warnings:");
        for warning in &report.warnings {
            println!("- {warning}");
        }
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let dotenv = env_loader::load_dotenv();
    logging::init();
    if let DotenvLoadOutcome::LoadedFallback(path) = &dotenv {
        tracing::debug!(path = %path.display(), "loaded fallback .env");
    }

    let report = match &cli.command {
        Command::Patrol => commands::patrol::run(&PatrolCommandOptions::full())?,
        Command::Keywords(args) => {
            commands::patrol::run(&PatrolCommandOptions::keywords_only(args.all))?
        }
        Command::Accounts(args) => {
            commands::patrol::run(&PatrolCommandOptions::accounts_only(args.all))?
        }
        Command::Search(args) => commands::search::run(&SearchOptions {
            query: args.query.clone(),
            limit: args.limit,
        })?,
        Command::Status => commands::status::run()?,
        Command::Maintain(args) => commands::maintain::run(&MaintainOptions { apply: args.apply })?,
        Command::Health => {
            let report = commands::health::run()?;
            // health is consumed by agents: the snapshot itself, always JSON
            for warning in &report.warnings {
                eprintln!("warning: {warning}");
            }
            if let Some(data) = &report.data {
                println!("{}", serde_json::to_string_pretty(data)?);
            }
            return Ok(());
        }
        Command::AddKeyword(args) => commands::watchlist_edit::run(&Edit::AddKeyword {
            text: args.keyword.clone(),
            tier: args.tier.into(),
        })?,
        Command::RemoveKeyword(args) => commands::watchlist_edit::run(&Edit::RemoveKeyword {
            text: args.keyword.clone(),
        })?,
        Command::AddAccount(args) => commands::watchlist_edit::run(&Edit::AddAccount {
            handle: args.handle.clone(),
            tier: args.tier.clone(),
        })?,
        Command::RemoveAccount(args) => commands::watchlist_edit::run(&Edit::RemoveAccount {
            handle: args.handle.clone(),
        })?,
        Command::Migrate => commands::migrate::run()?,
    };

    print_report(&report, cli.json)
}
