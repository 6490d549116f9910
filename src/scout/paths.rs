use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ScoutPaths {
    pub scout_home: PathBuf,
    pub watchlist_file: PathBuf,
    pub state_dir: PathBuf,
    pub state_file: PathBuf,
    pub metrics_file: PathBuf,
    pub lock_file: PathBuf,
    pub raw_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub scout_home_is_explicit: bool,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

fn scout_home_from_inputs(home: PathBuf, scout_home_env: Option<&str>) -> (PathBuf, bool) {
    match scout_home_env {
        Some(v) if !v.trim().is_empty() => (PathBuf::from(v.trim()), true),
        _ => (home.join(".scout"), false),
    }
}

pub fn resolve_paths() -> Result<ScoutPaths> {
    let home = required_home_dir()?;
    let scout_home_env = env::var("SCOUT_HOME").ok();
    let (scout_home, is_explicit) = scout_home_from_inputs(home, scout_home_env.as_deref());
    Ok(paths_under(scout_home, is_explicit))
}

pub fn paths_under(scout_home: PathBuf, scout_home_is_explicit: bool) -> ScoutPaths {
    let watchlist_file = env_or_default_path("SCOUT_WATCHLIST", scout_home.join("watchlist.toml"));
    let state_dir = env_or_default_path("SCOUT_STATE_DIR", scout_home.join("state"));
    let raw_dir = env_or_default_path("SCOUT_RAW_DIR", scout_home.join("raw"));
    let logs_dir = env_or_default_path("SCOUT_LOGS_DIR", scout_home.join("logs"));

    ScoutPaths {
        state_file: state_dir.join("patrol-state.json"),
        metrics_file: state_dir.join("watchlist-metrics.json"),
        lock_file: state_dir.join("patrol.lock"),
        reports_dir: state_dir.join("reports"),
        scout_home,
        watchlist_file,
        state_dir,
        raw_dir,
        logs_dir,
        scout_home_is_explicit,
    }
}
