mod common;

use common::{Scout, files_in, stdout_json};
use predicates::str::contains;

const WATCHLIST: &str = r#"
schema_version = 2

[keywords]
core = ["rust"]
trending = ["mcp", "wasm", "llm"]

[accounts]
tier1 = ["alice"]

[accounts.tier2]
builders = ["bob", "carol"]

[schedule]
keywords_per_run = 1
accounts_per_run = 1
expand_threads = false

[filters]
exclude_keywords = ["giveaway"]
"#;

const RUST_RESULTS: &str = r#"[
  {"id": "p1", "text": "rust 1.90 released", "author": "ferris", "engagement": {"likes": 40, "shares": 2}},
  {"id": "p2", "text": "Huge GIVEAWAY today", "author": "spam"},
  {"id": "p3", "text": "async traits deep dive", "author": "ferris"}
]"#;

#[test]
fn missing_watchlist_exits_with_error() {
    let scout = Scout::new();
    scout
        .cmd()
        .arg("patrol")
        .assert()
        .code(1)
        .stderr(contains("watchlist not found"));
    assert!(!scout.path("state/patrol-state.json").exists());
}

#[test]
fn invalid_watchlist_exits_before_touching_state() {
    let scout = Scout::new();
    scout.watchlist("[schedule]\nkeywords_per_run = 0\n");
    scout
        .cmd()
        .arg("patrol")
        .assert()
        .code(1)
        .stderr(contains("keywords_per_run"));
    assert!(!scout.path("state/patrol-state.json").exists());
    assert!(!scout.path("state/watchlist-metrics.json").exists());
}

#[test]
fn patrol_persists_state_metrics_and_raw_output() {
    let scout = Scout::new();
    scout
        .watchlist(WATCHLIST)
        .respond("search_rust", RUST_RESULTS)
        .respond(
            "source_alice",
            r#"{"data": [{"id": "a1", "text": "shipping", "author_id": "alice", "public_metrics": {"like_count": 5, "retweet_count": 1}}]}"#,
        );

    scout
        .cmd()
        .arg("patrol")
        .assert()
        .success()
        .stdout(contains("kept=3 excluded=1 dedup_dropped=0"));

    assert_eq!(
        scout.calls(),
        vec![
            "search rust --limit 10",
            "search mcp --limit 10",
            "source alice --limit 5",
            "source bob --limit 5",
        ]
    );

    let state = scout.read_json("state/patrol-state.json");
    assert_eq!(state["keyword_cursor"], 1);
    assert_eq!(state["account_cursor"], 1);
    let seen: Vec<&str> = state["seen_item_ids"]
        .as_array()
        .expect("seen")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(seen, vec!["p1", "p3", "a1"]);
    assert!(state["last_run_epoch_secs"].as_u64().is_some());

    let metrics = scout.read_json("state/watchlist-metrics.json");
    assert_eq!(metrics["keywords"]["rust"]["hits"], 1);
    assert_eq!(metrics["keywords"]["rust"]["total_items"], 2);
    assert_eq!(metrics["keywords"]["rust"]["cumulative_engagement"], 46);
    assert_eq!(metrics["keywords"]["mcp"]["misses"], 1);
    assert_eq!(metrics["accounts"]["bob"]["consecutive_failures"], 1);

    let raw = files_in(&scout.path("raw"));
    assert_eq!(raw.len(), 1);
    let body = std::fs::read_to_string(&raw[0]).expect("raw");
    assert!(body.contains("id: p1"));
    assert!(!body.contains("GIVEAWAY"));

    assert!(scout.read("logs/audit.log").contains("\"phase\":\"patrol\""));
}

#[test]
fn second_patrol_drops_already_seen_items() {
    let scout = Scout::new();
    scout.watchlist(WATCHLIST).respond("search_rust", RUST_RESULTS);

    scout.cmd().arg("patrol").assert().success();
    let output = scout
        .cmd()
        .args(["--json", "patrol"])
        .output()
        .expect("run patrol");
    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["data"]["kept_total"], 0);
    assert_eq!(report["data"]["dedup_dropped_total"], 2);

    let state = scout.read_json("state/patrol-state.json");
    assert_eq!(state["keyword_cursor"], 2);
    assert_eq!(state["account_cursor"], 0);
}

#[test]
fn keywords_all_visits_whole_pool_and_keeps_cursor() {
    let scout = Scout::new();
    scout.watchlist(WATCHLIST);

    scout.cmd().args(["keywords", "--all"]).assert().success();

    assert_eq!(
        scout.calls(),
        vec![
            "search rust --limit 10",
            "search mcp --limit 10",
            "search wasm --limit 10",
            "search llm --limit 10",
        ]
    );
    let state = scout.read_json("state/patrol-state.json");
    assert_eq!(state["keyword_cursor"], 0);
}

#[test]
fn auth_failure_on_first_call_is_fatal_and_writes_nothing() {
    let scout = Scout::new();
    scout.watchlist(WATCHLIST).fail("search_rust", 77);

    scout
        .cmd()
        .arg("patrol")
        .assert()
        .code(1)
        .stderr(contains("rejected credentials"));

    assert!(!scout.path("state/patrol-state.json").exists());
    assert!(!scout.path("state/watchlist-metrics.json").exists());
    assert_eq!(scout.calls().len(), 1);
}

#[test]
fn account_outage_switches_to_fallback_feed() {
    let scout = Scout::new();
    let watchlist = format!("{WATCHLIST}\n[fallback]\naccounts_feed = \"home\"\n");
    scout
        .watchlist(&watchlist)
        .fail("source_alice", 1)
        .respond("source_home", r#"[{"id": "h1", "text": "from the feed", "author": "zed"}]"#);

    scout
        .cmd()
        .arg("accounts")
        .assert()
        .success()
        .stdout(contains("accounts.outage=transport abandoned=1"))
        .stdout(contains("accounts.fallback=home kept=1"));

    assert_eq!(
        scout.calls(),
        vec!["source alice --limit 5", "source home --limit 5"]
    );
    let metrics = scout.read_json("state/watchlist-metrics.json");
    assert_eq!(metrics["accounts"]["alice"]["last_error"], "transport");
    assert!(metrics["accounts"].get("bob").is_none());
    assert!(metrics["accounts"].get("home").is_none());
}

#[test]
fn discovery_appends_high_engagement_authors() {
    let scout = Scout::new();
    scout.watchlist(WATCHLIST).respond(
        "search_rust",
        r#"[{"id": "v1", "text": "viral", "author": "newcomer", "engagement": {"likes": 2500}}]"#,
    );

    scout
        .cmd()
        .arg("patrol")
        .assert()
        .success()
        .stdout(contains("discovered=newcomer"));

    let watchlist = scout.read("watchlist.toml");
    assert!(watchlist.contains("newcomer"));
    assert!(watchlist.contains("first_seen_engagement = 2500"));
}

#[test]
fn search_does_not_touch_state() {
    let scout = Scout::new();
    scout.watchlist(WATCHLIST).respond("search_llm_agents", RUST_RESULTS);

    scout
        .cmd()
        .args(["search", "llm agents", "--limit", "3"])
        .assert()
        .success()
        .stdout(contains("fetched=3 excluded=1 kept=2"));

    assert_eq!(scout.calls(), vec!["search llm agents --limit 3"]);
    assert!(!scout.path("state/patrol-state.json").exists());
    assert_eq!(files_in(&scout.path("raw")).len(), 1);
}
