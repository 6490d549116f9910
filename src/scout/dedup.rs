use crate::scout::item::Item;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

pub const SEEN_CAPACITY: usize = 500;

/// Insertion-ordered set of processed item ids. Oldest ids are evicted first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SeenSet {
    order: VecDeque<String>,
    index: HashSet<String>,
}

impl From<Vec<String>> for SeenSet {
    fn from(ids: Vec<String>) -> Self {
        let mut set = SeenSet::default();
        for id in ids {
            set.insert(&id);
        }
        set
    }
}

impl From<SeenSet> for Vec<String> {
    fn from(set: SeenSet) -> Self {
        set.order.into_iter().collect()
    }
}

impl SeenSet {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Returns false when the id was already present or is blank.
    pub fn insert(&mut self, id: &str) -> bool {
        let id = id.trim();
        if id.is_empty() || self.index.contains(id) {
            return false;
        }
        self.index.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }

    /// Drop the oldest ids until at most `cap` remain.
    pub fn truncate_oldest(&mut self, cap: usize) -> usize {
        let mut evicted = 0;
        while self.order.len() > cap {
            if let Some(oldest) = self.order.pop_front() {
                self.index.remove(&oldest);
                evicted += 1;
            }
        }
        evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

pub fn matches_exclude(text: &str, exclude: &[String]) -> bool {
    if exclude.is_empty() {
        return false;
    }
    let lower = text.to_lowercase();
    exclude
        .iter()
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .any(|kw| lower.contains(&kw))
}

/// Drop items whose text contains any exclude-list substring, ignoring case.
pub fn filter_exclude(items: Vec<Item>, exclude: &[String]) -> (Vec<Item>, usize) {
    let before = items.len();
    let kept: Vec<Item> = items
        .into_iter()
        .filter(|item| !matches_exclude(&item.text, exclude))
        .collect();
    let excluded = before - kept.len();
    (kept, excluded)
}

/// Drop items already in `seen`, repeated within the batch, or without an id.
/// Kept ids are recorded in `seen`.
pub fn dedup(items: Vec<Item>, seen: &mut SeenSet) -> (Vec<Item>, usize) {
    let mut kept = Vec::with_capacity(items.len());
    let mut dropped = 0usize;
    for item in items {
        if !item.has_id() || !seen.insert(&item.id) {
            dropped += 1;
            continue;
        }
        kept.push(item);
    }
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, text: &str) -> Item {
        Item {
            id: id.to_string(),
            text: text.to_string(),
            ..Item::default()
        }
    }

    #[test]
    fn exclude_is_case_insensitive_substring_match() {
        let exclude = vec!["Giveaway".to_string(), "airdrop".to_string()];
        let items = vec![
            item("1", "huge GIVEAWAY today"),
            item("2", "release notes for 1.2"),
            item("3", "claim your AirDrop"),
        ];
        let (kept, excluded) = filter_exclude(items, &exclude);
        assert_eq!(excluded, 2);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "2");
    }

    #[test]
    fn blank_exclude_entries_match_nothing() {
        let (kept, excluded) = filter_exclude(vec![item("1", "text")], &["  ".to_string()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(excluded, 0);
    }

    #[test]
    fn dedup_keeps_first_occurrence_within_a_batch() {
        let mut seen = SeenSet::default();
        let items = vec![item("a", "first"), item("b", ""), item("a", "second")];
        let (kept, dropped) = dedup(items, &mut seen);
        assert_eq!(dropped, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].text, "first");
        assert!(seen.contains("a"));
        assert!(seen.contains("b"));
    }

    #[test]
    fn dedup_drops_ids_seen_in_an_earlier_cycle() {
        let mut seen = SeenSet::default();
        let (first, _) = dedup(vec![item("x", "")], &mut seen);
        let (second, dropped) = dedup(vec![item("x", ""), item("y", "")], &mut seen);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, "y");
        assert_eq!(dropped, 1);
    }

    #[test]
    fn items_without_id_count_as_dropped() {
        let mut seen = SeenSet::default();
        let (kept, dropped) = dedup(vec![item("", "anon"), item("  ", "blank")], &mut seen);
        assert!(kept.is_empty());
        assert_eq!(dropped, 2);
        assert!(seen.is_empty());
    }

    #[test]
    fn truncation_evicts_oldest_first() {
        let mut seen = SeenSet::default();
        for i in 0..(SEEN_CAPACITY + 20) {
            seen.insert(&format!("id-{i}"));
        }
        let evicted = seen.truncate_oldest(SEEN_CAPACITY);
        assert_eq!(evicted, 20);
        assert_eq!(seen.len(), SEEN_CAPACITY);
        assert!(!seen.contains("id-0"));
        assert!(!seen.contains("id-19"));
        assert!(seen.contains("id-20"));
        assert_eq!(seen.iter().next(), Some("id-20"));
    }

    #[test]
    fn serializes_as_ordered_list() {
        let seen = SeenSet::from(vec!["b".to_string(), "a".to_string(), "b".to_string()]);
        let raw = serde_json::to_string(&seen).expect("json");
        assert_eq!(raw, r#"["b","a"]"#);
        let back: SeenSet = serde_json::from_str(&raw).expect("parse");
        assert_eq!(back, seen);
    }
}
