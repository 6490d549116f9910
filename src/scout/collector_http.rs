use crate::scout::collector::{CollectError, CollectResult, Collector};
use crate::scout::collector_command::parse_items;
use crate::scout::item::Item;
use crate::scout::util::truncate_with_ellipsis;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

const MAX_ERROR_CHARS: usize = 200;

/// Collector backed by a JSON gateway:
/// `GET /search?q=&limit=`, `GET /sources/{id}/items?limit=`,
/// `GET /threads/{id}?limit=`, `GET /sources/{id}/profile`.
pub struct HttpCollector {
    client: Client,
    base: Url,
    token: Option<String>,
    timeout_secs: u64,
    label: String,
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(alias = "username")]
    handle: Option<String>,
}

pub fn classify_status(status: StatusCode, body: &str) -> CollectError {
    let detail = format!(
        "{} {}",
        status.as_u16(),
        truncate_with_ellipsis(body.trim(), MAX_ERROR_CHARS)
    )
    .trim()
    .to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CollectError::AuthFailure(detail),
        StatusCode::TOO_MANY_REQUESTS => CollectError::RateLimited(detail),
        _ => CollectError::Transport(detail),
    }
}

impl HttpCollector {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url.trim())
            .with_context(|| format!("invalid collector base_url `{base_url}`"))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build collector http client")?;
        Ok(Self {
            label: format!("http:{base}"),
            client,
            base,
            token,
            timeout_secs: timeout.as_secs(),
        })
    }

    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> CollectResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CollectError::Transport(format!("base url {} cannot carry a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// `Ok(None)` for 404, so profile lookups can treat it as unknown.
    fn get(&self, url: Url) -> CollectResult<Option<String>> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().map_err(|err| {
            if err.is_timeout() {
                CollectError::Timeout(self.timeout_secs)
            } else {
                CollectError::Transport(err.to_string())
            }
        })?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| CollectError::Malformed(err.to_string()))?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }
        Ok(Some(body))
    }

    fn items(&self, segments: &[&str], limit: usize, query: Option<&str>) -> CollectResult<Vec<Item>> {
        let mut params = vec![("limit", limit.to_string())];
        if let Some(q) = query {
            params.insert(0, ("q", q.to_string()));
        }
        let url = self.url(segments, &params)?;
        match self.get(url)? {
            Some(body) => parse_items(&body),
            None => Ok(Vec::new()),
        }
    }
}

impl Collector for HttpCollector {
    fn name(&self) -> &str {
        &self.label
    }

    fn search(&self, query: &str, limit: usize) -> CollectResult<Vec<Item>> {
        self.items(&["search"], limit, Some(query))
    }

    fn fetch_by_source(&self, source_id: &str, limit: usize) -> CollectResult<Vec<Item>> {
        self.items(&["sources", source_id, "items"], limit, None)
    }

    fn fetch_thread(&self, conversation_id: &str, limit: usize) -> CollectResult<Vec<Item>> {
        self.items(&["threads", conversation_id], limit, None)
    }

    fn resolve_handle(&self, source_id: &str) -> CollectResult<Option<String>> {
        let url = self.url(&["sources", source_id, "profile"], &[])?;
        let Some(body) = self.get(url)? else {
            return Ok(None);
        };
        if body.trim().is_empty() {
            return Ok(None);
        }
        let profile: Profile = serde_json::from_str(&body)
            .map_err(|err| CollectError::Malformed(err.to_string()))?;
        Ok(profile
            .handle
            .map(|h| h.trim().trim_start_matches('@').to_string())
            .filter(|h| !h.is_empty()))
    }
}
