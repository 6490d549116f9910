use crate::error::ScoutError;
use crate::scout::item::EngagementWeights;
use crate::scout::migrate::{self, LegacyScheduleFields};
use crate::scout::paths::ScoutPaths;
use crate::scout::util::write_atomic;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;

pub const WATCHLIST_SCHEMA_VERSION: u32 = 2;
pub const DEFAULT_TIER2_GROUP: &str = "general";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordTier {
    Core,
    Trending,
}

impl KeywordTier {
    pub fn label(self) -> &'static str {
        match self {
            KeywordTier::Core => "core",
            KeywordTier::Trending => "trending",
        }
    }

    pub fn is_protected(self) -> bool {
        matches!(self, KeywordTier::Core)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccountTier {
    Tier1,
    Tier2(String),
    Discovered,
}

impl AccountTier {
    pub fn label(&self) -> String {
        match self {
            AccountTier::Tier1 => "tier1".to_string(),
            AccountTier::Tier2(group) => format!("tier2:{group}"),
            AccountTier::Discovered => "discovered".to_string(),
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, AccountTier::Tier1)
    }

    /// Accepts `tier1`, `discovered`, `tier2`, `tier2:<group>` and the
    /// legacy `tier2_<group>` spelling.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().to_ascii_lowercase();
        match trimmed.as_str() {
            "tier1" => return Ok(AccountTier::Tier1),
            "discovered" => return Ok(AccountTier::Discovered),
            "tier2" => return Ok(AccountTier::Tier2(DEFAULT_TIER2_GROUP.to_string())),
            _ => {}
        }
        let group = trimmed
            .strip_prefix("tier2:")
            .or_else(|| trimmed.strip_prefix("tier2_"))
            .map(str::trim)
            .filter(|g| !g.is_empty());
        match group {
            Some(group) => Ok(AccountTier::Tier2(group.to_string())),
            None => Err(anyhow!(
                "unknown account tier `{raw}`: use tier1, tier2, tier2:<group>, or discovered"
            )),
        }
    }
}

impl fmt::Display for AccountTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Keyword,
    Account,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Keyword => "keyword",
            EntityKind::Account => "account",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DiscoveredRepr")]
pub struct DiscoveredCandidate {
    pub id: String,
    pub first_seen_engagement: u64,
}

impl DiscoveredCandidate {
    /// Numeric ids still need to be resolved to a handle.
    pub fn is_unresolved(&self) -> bool {
        !self.id.is_empty() && self.id.chars().all(|c| c.is_ascii_digit())
    }
}

/// Operators may list discovered entries as bare ids.
#[derive(Deserialize)]
#[serde(untagged)]
enum DiscoveredRepr {
    Id(String),
    Full {
        id: String,
        #[serde(default)]
        first_seen_engagement: u64,
    },
}

impl From<DiscoveredRepr> for DiscoveredCandidate {
    fn from(repr: DiscoveredRepr) -> Self {
        match repr {
            DiscoveredRepr::Id(id) => DiscoveredCandidate {
                id,
                first_seen_engagement: 0,
            },
            DiscoveredRepr::Full {
                id,
                first_seen_engagement,
            } => DiscoveredCandidate {
                id,
                first_seen_engagement,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Keywords {
    pub core: Vec<String>,
    pub trending: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Accounts {
    pub tier1: Vec<String>,
    pub tier2: BTreeMap<String, Vec<String>>,
    pub discovered: Vec<DiscoveredCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub keywords_per_run: usize,
    pub accounts_per_run: usize,
    pub search_limit: usize,
    pub source_limit: usize,
    pub thread_limit: usize,
    pub request_delay_ms: u64,
    pub call_timeout_secs: u64,
    pub expand_threads: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            keywords_per_run: 3,
            accounts_per_run: 6,
            search_limit: 10,
            source_limit: 5,
            thread_limit: 100,
            request_delay_ms: 1000,
            call_timeout_secs: 60,
            expand_threads: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    pub exclude_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub min_likes: u64,
    #[serde(alias = "min_retweets")]
    pub min_shares: u64,
    pub max_discovered: usize,
    pub resolve_per_maintain: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_likes: 1000,
            min_shares: 200,
            max_discovered: 20,
            resolve_per_maintain: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub min_attempts: u64,
    pub dead_consecutive_failures: u64,
    pub dead_max_hit_rate: f64,
    pub struggling_min_attempts: u64,
    pub struggling_max_avg_engagement: f64,
    pub star_min_avg_engagement: f64,
    pub overdue_after_days: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            min_attempts: 2,
            dead_consecutive_failures: 5,
            dead_max_hit_rate: 0.2,
            struggling_min_attempts: 3,
            struggling_max_avg_engagement: 10.0,
            star_min_avg_engagement: 500.0,
            overdue_after_days: 3,
        }
    }
}

/// Cheaper feeds consulted when a source looks down for the whole cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub keywords_feed: Option<String>,
    pub accounts_feed: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorKind {
    #[default]
    Command,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub kind: CollectorKind,
    pub command: String,
    pub base_url: Option<String>,
    pub token_env: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            kind: CollectorKind::Command,
            command: "scout-collector".to_string(),
            base_url: None,
            token_env: "SCOUT_COLLECTOR_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Watchlist {
    pub schema_version: u32,
    pub keywords: Keywords,
    pub accounts: Accounts,
    pub schedule: ScheduleConfig,
    pub filters: FiltersConfig,
    pub discovery: DiscoveryConfig,
    pub maintenance: MaintenanceConfig,
    pub engagement: EngagementWeights,
    pub fallback: FallbackConfig,
    pub collector: CollectorConfig,
}

impl Default for Watchlist {
    fn default() -> Self {
        Self {
            schema_version: WATCHLIST_SCHEMA_VERSION,
            keywords: Keywords::default(),
            accounts: Accounts::default(),
            schedule: ScheduleConfig::default(),
            filters: FiltersConfig::default(),
            discovery: DiscoveryConfig::default(),
            maintenance: MaintenanceConfig::default(),
            engagement: EngagementWeights::default(),
            fallback: FallbackConfig::default(),
            collector: CollectorConfig::default(),
        }
    }
}

pub fn normalize_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_string()
}

fn same_handle(a: &str, b: &str) -> bool {
    normalize_handle(a).eq_ignore_ascii_case(&normalize_handle(b))
}

impl Watchlist {
    /// All tier2 groups concatenated in group-name order: the rotating pool.
    pub fn tier2_pool(&self) -> Vec<String> {
        self.accounts.tier2.values().flatten().cloned().collect()
    }

    pub fn keyword_tier(&self, text: &str) -> Option<KeywordTier> {
        if self.keywords.core.iter().any(|k| k == text) {
            Some(KeywordTier::Core)
        } else if self.keywords.trending.iter().any(|k| k == text) {
            Some(KeywordTier::Trending)
        } else {
            None
        }
    }

    /// The highest-priority tier holding `handle`.
    pub fn account_tier(&self, handle: &str) -> Option<AccountTier> {
        if self.accounts.tier1.iter().any(|h| same_handle(h, handle)) {
            return Some(AccountTier::Tier1);
        }
        for (group, handles) in &self.accounts.tier2 {
            if handles.iter().any(|h| same_handle(h, handle)) {
                return Some(AccountTier::Tier2(group.clone()));
            }
        }
        if self
            .accounts
            .discovered
            .iter()
            .any(|d| same_handle(&d.id, handle))
        {
            return Some(AccountTier::Discovered);
        }
        None
    }

    pub fn knows_account(&self, handle: &str) -> bool {
        self.account_tier(handle).is_some()
    }

    pub fn add_keyword(&mut self, text: &str, tier: KeywordTier) -> bool {
        let text = text.trim();
        if text.is_empty() || self.keyword_tier(text).is_some() {
            return false;
        }
        let list = match tier {
            KeywordTier::Core => &mut self.keywords.core,
            KeywordTier::Trending => &mut self.keywords.trending,
        };
        list.push(text.to_string());
        true
    }

    pub fn remove_keyword(&mut self, text: &str) -> Option<KeywordTier> {
        let tier = self.keyword_tier(text)?;
        self.remove_keyword_from(text, tier).then_some(tier)
    }

    pub fn remove_keyword_from(&mut self, text: &str, tier: KeywordTier) -> bool {
        let list = match tier {
            KeywordTier::Core => &mut self.keywords.core,
            KeywordTier::Trending => &mut self.keywords.trending,
        };
        let before = list.len();
        list.retain(|k| k != text);
        list.len() < before
    }

    pub fn add_account(&mut self, handle: &str, tier: &AccountTier) -> bool {
        let handle = normalize_handle(handle);
        if handle.is_empty() || self.knows_account(&handle) {
            return false;
        }
        match tier {
            AccountTier::Tier1 => self.accounts.tier1.push(handle),
            AccountTier::Tier2(group) => self
                .accounts
                .tier2
                .entry(group.clone())
                .or_default()
                .push(handle),
            AccountTier::Discovered => self.accounts.discovered.push(DiscoveredCandidate {
                id: handle,
                first_seen_engagement: 0,
            }),
        }
        true
    }

    pub fn remove_account(&mut self, handle: &str) -> Option<AccountTier> {
        let tier = self.account_tier(handle)?;
        self.remove_account_from(handle, &tier).then_some(tier)
    }

    pub fn remove_account_from(&mut self, handle: &str, tier: &AccountTier) -> bool {
        match tier {
            AccountTier::Tier1 => {
                let before = self.accounts.tier1.len();
                self.accounts.tier1.retain(|h| !same_handle(h, handle));
                self.accounts.tier1.len() < before
            }
            AccountTier::Tier2(group) => {
                let Some(list) = self.accounts.tier2.get_mut(group) else {
                    return false;
                };
                let before = list.len();
                list.retain(|h| !same_handle(h, handle));
                list.len() < before
            }
            AccountTier::Discovered => {
                let before = self.accounts.discovered.len();
                self.accounts
                    .discovered
                    .retain(|d| !same_handle(&d.id, handle));
                self.accounts.discovered.len() < before
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.schedule.keywords_per_run == 0 {
            return Err(anyhow!("invalid schedule.keywords_per_run: must be >= 1"));
        }
        if self.schedule.accounts_per_run == 0 {
            return Err(anyhow!("invalid schedule.accounts_per_run: must be >= 1"));
        }
        if self.schedule.search_limit == 0 || self.schedule.source_limit == 0 {
            return Err(anyhow!(
                "invalid schedule limits: search_limit and source_limit must be >= 1"
            ));
        }
        if self.schedule.call_timeout_secs == 0 {
            return Err(anyhow!("invalid schedule.call_timeout_secs: must be >= 1"));
        }
        if self.discovery.max_discovered == 0 {
            return Err(anyhow!("invalid discovery.max_discovered: must be >= 1"));
        }
        let m = &self.maintenance;
        if !(0.0..=1.0).contains(&m.dead_max_hit_rate) {
            return Err(anyhow!(
                "invalid maintenance.dead_max_hit_rate: require 0 <= rate <= 1"
            ));
        }
        if m.dead_consecutive_failures == 0 {
            return Err(anyhow!(
                "invalid maintenance.dead_consecutive_failures: must be >= 1"
            ));
        }
        if m.struggling_max_avg_engagement > m.star_min_avg_engagement {
            return Err(anyhow!(
                "invalid maintenance thresholds: require struggling_max_avg_engagement <= star_min_avg_engagement"
            ));
        }
        if self.collector.kind == CollectorKind::Http
            && self
                .collector
                .base_url
                .as_deref()
                .is_none_or(|u| u.trim().is_empty())
            && std::env::var("SCOUT_COLLECTOR_URL").is_err()
        {
            return Err(anyhow!(
                "invalid collector config: kind=http requires base_url or SCOUT_COLLECTOR_URL"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedWatchlist {
    pub watchlist: Watchlist,
    /// Legacy schedule fields lifted out of an older schema, not yet merged
    /// into the schedule state.
    pub legacy: Option<LegacyScheduleFields>,
    pub migrated_from: Option<u32>,
}

pub fn parse_watchlist(raw: &str) -> Result<LoadedWatchlist> {
    let mut table: toml::Table = toml::from_str(raw).map_err(|err| anyhow!("{err}"))?;
    let outcome = migrate::migrate_table(&mut table)?;
    let watchlist: Watchlist = toml::Value::Table(table)
        .try_into()
        .map_err(|err| anyhow!("{err}"))?;
    Ok(LoadedWatchlist {
        watchlist,
        legacy: outcome.legacy,
        migrated_from: outcome.migrated_from,
    })
}

pub fn load_watchlist(paths: &ScoutPaths) -> Result<LoadedWatchlist, ScoutError> {
    let file = &paths.watchlist_file;
    if !file.exists() {
        return Err(ScoutError::MissingWatchlist(file.display().to_string()));
    }
    let raw = fs::read_to_string(file)
        .map_err(|err| ScoutError::UnreadableWatchlist(format!("{}: {err}", file.display())))?;
    let loaded = parse_watchlist(&raw)
        .map_err(|err| ScoutError::InvalidWatchlist(format!("{}: {err:#}", file.display())))?;
    loaded
        .watchlist
        .validate()
        .map_err(|err| ScoutError::InvalidWatchlist(format!("{}: {err:#}", file.display())))?;
    Ok(loaded)
}

pub fn save_watchlist(paths: &ScoutPaths, watchlist: &Watchlist) -> Result<()> {
    let data = toml::to_string_pretty(watchlist)?;
    write_atomic(&paths.watchlist_file, data.as_bytes())
}
