use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Engagement {
    #[serde(alias = "like_count")]
    pub likes: u64,
    #[serde(alias = "retweet_count", alias = "shares_count")]
    pub shares: u64,
    #[serde(alias = "reply_count")]
    pub replies: u64,
    #[serde(alias = "impression_count", skip_serializing_if = "Option::is_none")]
    pub impressions: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementWeights {
    pub likes: u64,
    pub shares: u64,
    pub replies: u64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            likes: 1,
            shares: 3,
            replies: 1,
        }
    }
}

impl Engagement {
    pub fn weighted(&self, weights: &EngagementWeights) -> u64 {
        self.likes
            .saturating_mul(weights.likes)
            .saturating_add(self.shares.saturating_mul(weights.shares))
            .saturating_add(self.replies.saturating_mul(weights.replies))
    }
}

/// One piece of upstream content as returned by a collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub id: String,
    pub text: String,
    #[serde(alias = "author_id")]
    pub author: String,
    #[serde(alias = "public_metrics", alias = "metrics")]
    pub engagement: Engagement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<Vec<Item>>,
    /// Where the patrol found the item, e.g. `keyword:rust` or `account:alice`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub origin: String,
}

impl Item {
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

/// Collector payloads arrive either as a bare array or wrapped in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ItemsPayload {
    Bare(Vec<Item>),
    Wrapped {
        #[serde(alias = "data")]
        items: Option<Vec<Item>>,
    },
}

impl ItemsPayload {
    pub fn into_items(self) -> Vec<Item> {
        match self {
            ItemsPayload::Bare(items) => items,
            ItemsPayload::Wrapped { items } => items.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_engagement_uses_configured_weights() {
        let e = Engagement {
            likes: 10,
            shares: 2,
            replies: 4,
            impressions: Some(1000),
        };
        assert_eq!(e.weighted(&EngagementWeights::default()), 10 + 6 + 4);
        let likes_only = EngagementWeights {
            likes: 1,
            shares: 0,
            replies: 0,
        };
        assert_eq!(e.weighted(&likes_only), 10);
    }

    #[test]
    fn parses_upstream_metric_aliases() {
        let raw = r#"{"id":"1","text":"hi","author_id":"42",
            "public_metrics":{"like_count":5,"retweet_count":2,"reply_count":1}}"#;
        let item: Item = serde_json::from_str(raw).expect("item");
        assert_eq!(item.author, "42");
        assert_eq!(item.engagement.likes, 5);
        assert_eq!(item.engagement.shares, 2);
        assert_eq!(item.engagement.impressions, None);
    }

    #[test]
    fn payload_accepts_wrapped_and_bare_forms() {
        let wrapped: ItemsPayload =
            serde_json::from_str(r#"{"items":[{"id":"a"}]}"#).expect("wrapped");
        assert_eq!(wrapped.into_items().len(), 1);
        let data: ItemsPayload = serde_json::from_str(r#"{"data":[{"id":"a"},{"id":"b"}]}"#)
            .expect("data");
        assert_eq!(data.into_items().len(), 2);
        let bare: ItemsPayload = serde_json::from_str(r#"[{"id":"a"}]"#).expect("bare");
        assert_eq!(bare.into_items().len(), 1);
        let empty: ItemsPayload = serde_json::from_str(r#"{}"#).expect("empty");
        assert!(empty.into_items().is_empty());
    }

    #[test]
    fn missing_id_deserializes_as_empty() {
        let item: Item = serde_json::from_str(r#"{"text":"no id"}"#).expect("item");
        assert!(!item.has_id());
    }
}
