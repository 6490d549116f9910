#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Fake collector: answers `<verb> <arg>` from `fixtures/<verb>_<arg>.json`,
/// fails with the code in `fixtures/<verb>_<arg>.exit`, and logs every call.
const FAKE_COLLECTOR: &str = r#"#!/usr/bin/env bash
echo "$@" >> "__LOG__"
key="$1_$2"
key="${key//[^A-Za-z0-9_]/_}"
if [ -f "__DIR__/$key.exit" ]; then
  echo "collector failure for $key" >&2
  exit "$(cat "__DIR__/$key.exit")"
fi
if [ -f "__DIR__/$key.json" ]; then
  cat "__DIR__/$key.json"
fi
exit 0
"#;

pub struct Scout {
    pub tmp: TempDir,
    pub home: PathBuf,
    pub fixtures: PathBuf,
    pub calls_log: PathBuf,
    pub collector: PathBuf,
}

impl Scout {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let home = tmp.path().join("scout-home");
        let fixtures = tmp.path().join("fixtures");
        fs::create_dir_all(&home).expect("mkdir home");
        fs::create_dir_all(&fixtures).expect("mkdir fixtures");
        let calls_log = tmp.path().join("calls.log");
        let collector = tmp.path().join("fake-collector");
        let script = FAKE_COLLECTOR
            .replace("__LOG__", &calls_log.display().to_string())
            .replace("__DIR__", &fixtures.display().to_string());
        fs::write(&collector, script).expect("write fake collector");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&collector).expect("metadata").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&collector, perms).expect("chmod");
        }
        Self {
            tmp,
            home,
            fixtures,
            calls_log,
            collector,
        }
    }

    pub fn watchlist(&self, body: &str) -> &Self {
        fs::write(self.home.join("watchlist.toml"), body).expect("write watchlist");
        self
    }

    pub fn respond(&self, key: &str, json: &str) -> &Self {
        fs::write(self.fixtures.join(format!("{key}.json")), json).expect("write fixture");
        self
    }

    pub fn fail(&self, key: &str, code: i32) -> &Self {
        fs::write(self.fixtures.join(format!("{key}.exit")), code.to_string())
            .expect("write fixture");
        self
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("scout");
        cmd.current_dir(self.tmp.path())
            .env("SCOUT_HOME", &self.home)
            .env("SCOUT_COLLECTOR_BIN", &self.collector)
            .env("SCOUT_REQUEST_DELAY_MS", "0")
            .env_remove("SCOUT_WATCHLIST")
            .env_remove("SCOUT_STATE_DIR")
            .env_remove("SCOUT_RAW_DIR")
            .env_remove("SCOUT_LOGS_DIR")
            .env_remove("SCOUT_CALL_TIMEOUT_SECS")
            .env_remove("SCOUT_LOG");
        cmd
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.calls_log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.home.join(rel)
    }

    pub fn read_json(&self, rel: &str) -> serde_json::Value {
        let raw = fs::read_to_string(self.path(rel)).expect("read json");
        serde_json::from_str(&raw).expect("parse json")
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).expect("read file")
    }
}

pub fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout json")
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
        Err(_) => Vec::new(),
    }
}
