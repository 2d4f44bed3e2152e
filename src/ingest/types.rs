// src/ingest/types.rs
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which tier of upstream a feed belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedCategory {
    PrimarySearch,
    National,
    TeamSpecific,
}

impl FeedCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedCategory::PrimarySearch => "primary-search",
            FeedCategory::National => "national",
            FeedCategory::TeamSpecific => "team-specific",
        }
    }
}

/// Static description of one upstream feed. Loaded once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    pub id: String,
    pub display_name: String,
    /// Literal RSS endpoint, or a template containing `{query}` for search feeds.
    pub url: String,
    pub category: FeedCategory,
    /// Per-feed budget. Never exceeds the timeout of the stage that calls it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl FeedDescriptor {
    pub fn new(id: &str, display_name: &str, url: &str, category: FeedCategory) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            url: url.to_string(),
            category,
            timeout_ms: None,
        }
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// The feed's own timeout clamped to `stage`, or `stage` when unset.
    pub fn effective_timeout(&self, stage: Duration) -> Duration {
        self.timeout_ms
            .map(|ms| Duration::from_millis(ms).min(stage))
            .unwrap_or(stage)
    }

    /// Substitute an already URL-encoded query into the template.
    /// Literal URLs come back unchanged.
    pub fn resolve_url(&self, encoded_query: &str) -> String {
        self.url.replace("{query}", encoded_query)
    }
}

/// One headline as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    /// Source-native date string; only parsed when ranking.
    #[serde(rename = "pubDate")]
    pub published_at: String,
    #[serde(rename = "source")]
    pub source_name: String,
    #[serde(rename = "feedType")]
    pub origin_category: FeedCategory,
    #[serde(rename = "topicId", default, skip_serializing_if = "Option::is_none")]
    pub topic_key: Option<String>,
}

impl NewsItem {
    /// `link` when present, else `title-publishedAt`.
    pub fn dedupe_key(&self) -> String {
        if self.link.is_empty() {
            format!("{}-{}", self.title, self.published_at)
        } else {
            self.link.clone()
        }
    }
}

/// Where a successful fetch got its items from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Fetched from upstream during this call.
    Live,
    /// Served from a cache entry still inside its TTL.
    Cached,
    /// Served from an expired cache entry after the live fetch failed.
    Stale,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Live => "live",
            Freshness::Cached => "cached",
            Freshness::Stale => "stale",
        }
    }
}

/// Result of a single feed fetch. Never an `Err`: failures are data.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub items: Vec<NewsItem>,
    pub ok: bool,
    pub error: Option<String>,
    pub freshness: Option<Freshness>,
}

impl FetchOutcome {
    pub fn success(items: Vec<NewsItem>, freshness: Freshness) -> Self {
        Self {
            items,
            ok: true,
            error: None,
            freshness: Some(freshness),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            ok: false,
            error: Some(message.into()),
            freshness: None,
        }
    }

    pub fn has_items(&self) -> bool {
        self.ok && !self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(link: &str, title: &str, date: &str) -> NewsItem {
        NewsItem {
            title: title.into(),
            link: link.into(),
            published_at: date.into(),
            source_name: "espn".into(),
            origin_category: FeedCategory::National,
            topic_key: None,
        }
    }

    #[test]
    fn dedupe_key_prefers_link() {
        assert_eq!(item("https://a/1", "T", "D").dedupe_key(), "https://a/1");
        assert_eq!(item("", "T", "D").dedupe_key(), "T-D");
    }

    #[test]
    fn serializes_with_wire_names() {
        let mut it = item("https://a/1", "T", "Mon, 01 Jan 2024 00:00:00 GMT");
        let v = serde_json::to_value(&it).unwrap();
        assert_eq!(v["pubDate"], "Mon, 01 Jan 2024 00:00:00 GMT");
        assert_eq!(v["source"], "espn");
        assert_eq!(v["feedType"], "national");
        assert!(v.get("topicId").is_none());

        it.topic_key = Some("duke-blue-devils".into());
        it.origin_category = FeedCategory::PrimarySearch;
        let v = serde_json::to_value(&it).unwrap();
        assert_eq!(v["topicId"], "duke-blue-devils");
        assert_eq!(v["feedType"], "primary-search");
    }

    #[test]
    fn resolve_url_fills_template_only() {
        let search = FeedDescriptor::new(
            "google",
            "Google News",
            "https://news.example/rss?q={query}&hl=en",
            FeedCategory::PrimarySearch,
        );
        assert_eq!(search.resolve_url("a%20b"), "https://news.example/rss?q=a%20b&hl=en");

        let plain = FeedDescriptor::new("cbs", "CBS", "https://cbs.example/rss", FeedCategory::National);
        assert_eq!(plain.resolve_url("ignored"), "https://cbs.example/rss");
    }

    #[test]
    fn feed_timeout_is_clamped_to_stage() {
        let stage = Duration::from_secs(5);
        let feed = FeedDescriptor::new("cbs", "CBS", "https://cbs.example/rss", FeedCategory::National);
        assert_eq!(feed.effective_timeout(stage), stage);
        let quick = feed.clone().with_timeout_ms(1200);
        assert_eq!(quick.effective_timeout(stage), Duration::from_millis(1200));
        let slow = feed.with_timeout_ms(60_000);
        assert_eq!(slow.effective_timeout(stage), stage);
    }
}
