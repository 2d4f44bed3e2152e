// src/ingest/fetcher.rs
//! Feed Fetcher: one feed in, normalized items out.
//!
//! Order of operations for every call:
//! 1. fresh cache entry → return it, no network;
//! 2. GET under `tokio::time::timeout` (the in-flight request is dropped on expiry);
//! 3. parse, normalize, cache non-empty results;
//! 4. on failure, serve an expired cache entry if one exists, else report the error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{debug, warn};

use crate::cache::{cache_key, FeedCache};
use crate::config::ParseFailurePolicy;
use crate::ingest::parser::{parse_feed, RawEntry};
use crate::ingest::transport::FeedTransport;
use crate::ingest::types::{FeedCategory, FeedDescriptor, FetchOutcome, Freshness, NewsItem};
use crate::ingest::{ensure_metrics_described, normalize_text, source_from_link};

pub const NO_TITLE: &str = "No title";

pub struct FeedFetcher {
    transport: Arc<dyn FeedTransport>,
    feed_cache: Arc<FeedCache>,
    search_cache: Arc<FeedCache>,
    parse_failure: ParseFailurePolicy,
}

impl FeedFetcher {
    /// `search_cache` holds the primary search source, `feed_cache` everything else.
    pub fn new(
        transport: Arc<dyn FeedTransport>,
        feed_cache: Arc<FeedCache>,
        search_cache: Arc<FeedCache>,
        parse_failure: ParseFailurePolicy,
    ) -> Self {
        ensure_metrics_described();
        Self {
            transport,
            feed_cache,
            search_cache,
            parse_failure,
        }
    }

    pub fn cache_for(&self, category: FeedCategory) -> &FeedCache {
        match category {
            FeedCategory::PrimarySearch => &self.search_cache,
            FeedCategory::National | FeedCategory::TeamSpecific => &self.feed_cache,
        }
    }

    /// Fetch one feed. Never fails; errors come back inside the outcome.
    pub async fn fetch(
        &self,
        feed: &FeedDescriptor,
        resolved_url: &str,
        timeout: Duration,
        topic_key: Option<&str>,
    ) -> FetchOutcome {
        if timeout.is_zero() {
            return FetchOutcome::failure("invalid timeout: must be > 0");
        }
        if let Err(msg) = check_url(resolved_url) {
            return FetchOutcome::failure(msg);
        }

        let cache = self.cache_for(feed.category);
        let key = cache_key(&feed.id, resolved_url);

        if let Some(items) = cache.get(&key) {
            debug!(target: "fetch", source = %feed.id, items = items.len(), freshness = "cached", "cache hit");
            counter!("news_cache_hits_total").increment(1);
            record_outcome(&feed.id, Freshness::Cached.as_str());
            return FetchOutcome::success(items, Freshness::Cached);
        }

        let t0 = Instant::now();
        let result = match tokio::time::timeout(timeout, self.transport.get_text(resolved_url)).await {
            Ok(Ok(body)) => self.items_from_body(feed, &body, topic_key),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err(format!("timed out after {}ms", timeout.as_millis())),
        };
        let elapsed_ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("news_fetch_ms").record(elapsed_ms);

        match result {
            Ok(items) => {
                if !items.is_empty() {
                    cache.set(&key, items.clone());
                }
                debug!(target: "fetch", source = %feed.id, items = items.len(), elapsed_ms, freshness = "live", "fetched");
                record_outcome(&feed.id, Freshness::Live.as_str());
                FetchOutcome::success(items, Freshness::Live)
            }
            Err(msg) => {
                warn!(target: "fetch", source = %feed.id, url = %resolved_url, error = %msg, elapsed_ms, "source failed");
                counter!("news_source_errors_total", "source" => feed.id.clone()).increment(1);

                if let Some(stale) = cache.get_stale(&key) {
                    warn!(target: "fetch", source = %feed.id, items = stale.len(), freshness = "stale", "serving expired cache entry");
                    counter!("news_stale_served_total").increment(1);
                    record_outcome(&feed.id, Freshness::Stale.as_str());
                    return FetchOutcome::success(stale, Freshness::Stale);
                }
                record_outcome(&feed.id, "failed");
                FetchOutcome::failure(msg)
            }
        }
    }

    fn items_from_body(
        &self,
        feed: &FeedDescriptor,
        body: &str,
        topic_key: Option<&str>,
    ) -> Result<Vec<NewsItem>, String> {
        match parse_feed(body) {
            Ok(entries) => Ok(entries
                .into_iter()
                .map(|e| to_news_item(e, feed, topic_key))
                .collect()),
            Err(e) => match self.parse_failure {
                ParseFailurePolicy::Lenient => {
                    debug!(target: "fetch", source = %feed.id, error = %e, "unparseable body treated as empty feed");
                    Ok(Vec::new())
                }
                ParseFailurePolicy::Fail => Err(format!("parse error: {e}")),
            },
        }
    }
}

fn record_outcome(source: &str, outcome: &'static str) {
    counter!("news_fetch_total", "source" => source.to_string(), "outcome" => outcome).increment(1);
}

fn check_url(url: &str) -> Result<(), String> {
    match reqwest::Url::parse(url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => Ok(()),
        Ok(u) => Err(format!("invalid url: unsupported scheme {}", u.scheme())),
        Err(e) => Err(format!("invalid url: {e}")),
    }
}

fn to_news_item(entry: RawEntry, feed: &FeedDescriptor, topic_key: Option<&str>) -> NewsItem {
    let title = entry
        .title
        .as_deref()
        .map(normalize_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());
    let link = entry.link.map(|l| l.trim().to_string()).unwrap_or_default();
    let source_name = entry
        .source
        .as_deref()
        .map(normalize_text)
        .filter(|s| !s.is_empty())
        .or_else(|| source_from_link(&link))
        .unwrap_or_else(|| feed.display_name.clone());

    NewsItem {
        title,
        link,
        published_at: entry.published.unwrap_or_default(),
        source_name,
        origin_category: feed.category,
        topic_key: topic_key.map(str::to_string),
    }
}
