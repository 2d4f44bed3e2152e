// src/orchestrator.rs
//! Staged fallback orchestrator.
//!
//! One request walks a fixed ladder and never errors out:
//!
//! | stage | action                                   | next                         |
//! |-------|------------------------------------------|------------------------------|
//! | 0     | resolve topic (synthesize if unknown)    | 1, or 4 when no topic given  |
//! | 1     | primary search fetch, long timeout       | 2                            |
//! | 2     | primary produced items?                  | yes → 3, no → 4              |
//! | 3     | concurrent fan-out to enabled secondaries| done                         |
//! | 4     | single fallback feed, short timeout      | items → done, else 5         |
//! | 5     | empty result                             | done                         |
//!
//! Every fetch goes through [`FeedFetcher`], so cache hits and stale-entry
//! recovery apply at stages 1, 3 and 4 alike.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use metrics::{gauge, histogram};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{Clock, FeedCache};
use crate::config::AggregatorConfig;
use crate::ingest::fetcher::FeedFetcher;
use crate::ingest::transport::FeedTransport;
use crate::ingest::types::{FeedDescriptor, FetchOutcome, NewsItem};
use crate::merge::MergeEngine;
use crate::registry::{Registry, TopicDescriptor};

/// What the caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateRequest {
    pub topic_id: Option<String>,
    pub include_national: bool,
    pub include_topic_feeds: bool,
}

impl AggregateRequest {
    pub fn for_topic(topic_id: &str) -> Self {
        Self {
            topic_id: Some(topic_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_national(mut self, on: bool) -> Self {
        self.include_national = on;
        self
    }

    pub fn with_topic_feeds(mut self, on: bool) -> Self {
        self.include_topic_feeds = on;
        self
    }
}

/// The orchestrator's only output. Serializes to the HTTP response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationResult {
    pub items: Vec<NewsItem>,
    #[serde(rename = "sourcesTried")]
    pub sources_attempted: Vec<String>,
    pub errors: Vec<String>,
}

impl AggregationResult {
    /// Terminal result for a request that blew up before reaching the ladder's end.
    pub fn internal_error(message: impl std::fmt::Display) -> Self {
        Self {
            errors: vec![format!("internal: {message}")],
            ..Self::default()
        }
    }
}

/// Attempt/error bookkeeping for one request.
#[derive(Default)]
struct Attempts {
    sources: Vec<String>,
    errors: Vec<String>,
}

impl Attempts {
    fn begin(&mut self, feed: &FeedDescriptor) {
        self.sources.push(feed.id.clone());
    }

    fn settle(&mut self, feed: &FeedDescriptor, outcome: &FetchOutcome) {
        if let Some(err) = outcome.error.as_deref() {
            self.errors.push(format!("{}: {}", feed.id, err));
        }
    }
}

pub struct Aggregator {
    fetcher: FeedFetcher,
    merge: MergeEngine,
    registry: Registry,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(
        fetcher: FeedFetcher,
        merge: MergeEngine,
        registry: Registry,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            fetcher,
            merge,
            registry,
            config,
        }
    }

    /// Wire the two cache tiers and the fetcher from config.
    pub fn build(
        config: AggregatorConfig,
        registry: Registry,
        merge: MergeEngine,
        transport: Arc<dyn FeedTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let feed_cache = Arc::new(FeedCache::new(config.feed_ttl(), clock.clone()));
        let search_cache = Arc::new(FeedCache::new(config.search_ttl(), clock));
        gauge!("news_cache_ttl_secs", "tier" => "feed").set(feed_cache.ttl().as_secs_f64());
        gauge!("news_cache_ttl_secs", "tier" => "search").set(search_cache.ttl().as_secs_f64());

        let fetcher = FeedFetcher::new(transport, feed_cache, search_cache, config.fetch.parse_failure);
        Self::new(fetcher, merge, registry, config)
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Stage 0.
    pub fn resolve_target(&self, topic_id: &str) -> TopicDescriptor {
        match self.registry.topics.resolve_topic(topic_id) {
            Some(t) => t.clone(),
            None => {
                debug!(target: "aggregate", topic = %topic_id, "unknown topic; synthesizing descriptor");
                TopicDescriptor::synthesize(topic_id, &self.config.search.keyword_suffix)
            }
        }
    }

    /// `"<name>" OR "<keywords>" when:<N>d`, URL-encoded.
    pub fn primary_query(&self, topic: &TopicDescriptor) -> String {
        let q = format!(
            "\"{}\" OR \"{}\" when:{}d",
            topic.display_name, topic.search_keywords, self.config.search.recency_window_days
        );
        urlencoding::encode(&q).into_owned()
    }

    pub async fn aggregate(&self, req: &AggregateRequest) -> AggregationResult {
        let t0 = Instant::now();
        let mut attempts = Attempts::default();

        let topic_id = req
            .topic_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let items = match topic_id {
            Some(id) => {
                let topic = self.resolve_target(id);
                let baseline = self.primary_stage(&topic, &mut attempts).await;
                if baseline.is_empty() {
                    debug!(target: "aggregate", topic = %id, "primary empty; skipping fan-out");
                    self.fallback_stage(&mut attempts).await
                } else {
                    self.fan_out_stage(&topic, baseline, req, &mut attempts).await
                }
            }
            None => self.fallback_stage(&mut attempts).await,
        };

        let elapsed_ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("news_aggregate_ms").record(elapsed_ms);
        histogram!("news_items_returned").record(items.len() as f64);
        info!(
            target: "aggregate",
            topic = topic_id.unwrap_or("-"),
            items = items.len(),
            sources = attempts.sources.len(),
            errors = attempts.errors.len(),
            elapsed_ms,
            "aggregation finished"
        );

        AggregationResult {
            items,
            sources_attempted: attempts.sources,
            errors: attempts.errors,
        }
    }

    /// Stage 1. Returns the unfiltered baseline.
    async fn primary_stage(&self, topic: &TopicDescriptor, attempts: &mut Attempts) -> Vec<NewsItem> {
        let feed = &self.registry.feeds.primary;
        let url = feed.resolve_url(&self.primary_query(topic));
        attempts.begin(feed);
        let timeout = feed.effective_timeout(self.config.primary_timeout());
        let outcome = self
            .fetcher
            .fetch(feed, &url, timeout, Some(&topic.id))
            .await;
        attempts.settle(feed, &outcome);
        outcome.items
    }

    /// Stage 3. Terminal regardless of how many secondaries fail.
    async fn fan_out_stage(
        &self,
        topic: &TopicDescriptor,
        baseline: Vec<NewsItem>,
        req: &AggregateRequest,
        attempts: &mut Attempts,
    ) -> Vec<NewsItem> {
        let feeds = &self.registry.feeds;
        let mut targets: Vec<(&FeedDescriptor, Option<&str>)> = Vec::new();
        if req.include_national {
            targets.extend(feeds.national.iter().map(|f| (f, None)));
        }
        if req.include_topic_feeds {
            targets.extend(
                feeds
                    .topic_feeds_for(&topic.id)
                    .iter()
                    .map(|f| (f, Some(topic.id.as_str()))),
            );
        }

        let timeout = self.config.secondary_timeout();
        for (feed, _) in &targets {
            attempts.begin(feed);
        }
        let outcomes = join_all(
            targets
                .iter()
                .map(|(feed, key)| {
                    self.fetcher
                        .fetch(feed, &feed.url, feed.effective_timeout(timeout), *key)
                }),
        )
        .await;

        let mut lists = Vec::with_capacity(outcomes.len() + 1);
        lists.push(baseline);
        for ((feed, _), outcome) in targets.iter().zip(outcomes) {
            attempts.settle(feed, &outcome);
            if outcome.has_items() {
                lists.push(outcome.items);
            }
        }
        if !attempts.errors.is_empty() {
            warn!(target: "aggregate", failed = attempts.errors.len(), "fan-out finished with failures");
        }
        self.merge.process(lists)
    }

    /// Stages 4 and 5.
    async fn fallback_stage(&self, attempts: &mut Attempts) -> Vec<NewsItem> {
        let feed = &self.registry.feeds.fallback;
        attempts.begin(feed);
        let timeout = feed.effective_timeout(self.config.fallback_timeout());
        let outcome = self.fetcher.fetch(feed, &feed.url, timeout, None).await;
        attempts.settle(feed, &outcome);
        if outcome.has_items() {
            self.merge.process(vec![outcome.items])
        } else {
            debug!(target: "aggregate", "fallback produced nothing; returning empty result");
            Vec::new()
        }
    }

    /// Upper bound on one request's wall time.
    pub fn worst_case_latency(&self) -> Duration {
        let c = &self.config;
        c.primary_timeout() + c.secondary_timeout().max(c.fallback_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::ingest::mock::{MockResponse, MockTransport};
    use crate::source_tiers::SourceTiers;
    use crate::topic_filter::TopicFilter;

    const FEEDS: &str = r#"
fallback_id = "wire"

[primary]
id = "search"
display_name = "Search"
url = "https://search.test/rss?q={query}"

[[national]]
id = "wire"
display_name = "Wire"
url = "https://wire.test/rss"

[[national]]
id = "desk"
display_name = "Desk"
url = "https://desk.test/rss"

[topic_feeds]
"duke-blue-devils" = [{ id = "dbr", display_name = "DBR", url = "https://dbr.test/rss" }]

[[topics]]
id = "duke-blue-devils"
display_name = "Duke Blue Devils"
search_keywords = "Duke basketball"
"#;

    fn aggregator(transport: MockTransport) -> (Aggregator, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let agg = Aggregator::build(
            AggregatorConfig::default(),
            Registry::from_toml_str(FEEDS).unwrap(),
            MergeEngine::new(TopicFilter::default_seed(), SourceTiers::default_seed()),
            transport.clone(),
            Arc::new(ManualClock::new(0)),
        );
        (agg, transport)
    }

    fn hoops(n: usize, host: &str) -> MockResponse {
        let rows = (0..n)
            .map(|i| {
                (
                    format!("College basketball story {i}"),
                    format!("https://{host}/{i}"),
                )
            })
            .collect::<Vec<_>>();
        let refs = rows
            .iter()
            .map(|(t, l)| (t.as_str(), l.as_str(), "Tue, 04 Feb 2025 10:00:00 GMT"))
            .collect::<Vec<_>>();
        MockResponse::rss(&refs)
    }

    #[test]
    fn query_embeds_name_keywords_and_window() {
        let (agg, _) = aggregator(MockTransport::new());
        let topic = agg.resolve_target("duke-blue-devils");
        assert_eq!(
            agg.primary_query(&topic),
            "%22Duke%20Blue%20Devils%22%20OR%20%22Duke%20basketball%22%20when%3A90d"
        );
        let synth = agg.resolve_target("acme-tigers");
        assert_eq!(synth.search_keywords, "Acme Tigers basketball");
    }

    #[tokio::test]
    async fn full_stack_when_primary_has_items() {
        let t = MockTransport::new()
            .route("search.test", hoops(2, "search.test"))
            .route("wire.test", hoops(1, "wire.test"))
            .route("desk.test", MockResponse::Status(502))
            .route("dbr.test", hoops(1, "dbr.test"));
        let (agg, _) = aggregator(t);
        let req = AggregateRequest::for_topic("duke-blue-devils")
            .with_national(true)
            .with_topic_feeds(true);
        let out = agg.aggregate(&req).await;

        assert_eq!(out.sources_attempted, ["search", "wire", "desk", "dbr"]);
        assert_eq!(out.errors, ["desk: HTTP 502"]);
        assert_eq!(out.items.len(), 4);
        let dbr = out.items.iter().find(|i| i.link.contains("dbr.test")).unwrap();
        assert_eq!(dbr.topic_key.as_deref(), Some("duke-blue-devils"));
        let wire = out.items.iter().find(|i| i.link.contains("wire.test")).unwrap();
        assert_eq!(wire.topic_key, None);
    }

    #[tokio::test]
    async fn flags_off_means_primary_only() {
        let t = MockTransport::new().route("search.test", hoops(2, "search.test"));
        let (agg, transport) = aggregator(t);
        let out = agg.aggregate(&AggregateRequest::for_topic("duke-blue-devils")).await;
        assert_eq!(out.sources_attempted, ["search"]);
        assert_eq!(out.items.len(), 2);
        assert_eq!(transport.total_calls(), 1);
    }

    #[tokio::test]
    async fn empty_primary_skips_fan_out() {
        let t = MockTransport::new()
            .route("search.test", MockResponse::rss(&[]))
            .route("wire.test", hoops(1, "wire.test"))
            .route("desk.test", hoops(1, "desk.test"));
        let (agg, transport) = aggregator(t);
        let req = AggregateRequest::for_topic("duke-blue-devils")
            .with_national(true)
            .with_topic_feeds(true);
        let out = agg.aggregate(&req).await;

        assert_eq!(out.sources_attempted, ["search", "wire"]);
        assert!(out.errors.is_empty());
        assert_eq!(out.items.len(), 1);
        assert_eq!(transport.calls_to("desk.test"), 0);
        assert_eq!(transport.calls_to("dbr.test"), 0);
    }

    #[tokio::test]
    async fn everything_down_is_still_a_result() {
        let (agg, _) = aggregator(MockTransport::new());
        let out = agg
            .aggregate(&AggregateRequest::for_topic("nobody-knows").with_national(true))
            .await;
        assert!(out.items.is_empty());
        assert_eq!(out.sources_attempted, ["search", "wire"]);
        assert_eq!(out.errors.len(), 2);
        assert!(out.errors[0].starts_with("search: "));
        assert!(out.errors[1].starts_with("wire: "));
    }

    #[tokio::test]
    async fn missing_topic_goes_straight_to_fallback() {
        let t = MockTransport::new().route("wire.test", hoops(3, "wire.test"));
        let (agg, transport) = aggregator(t);
        let req = AggregateRequest {
            topic_id: Some("   ".into()),
            include_national: true,
            include_topic_feeds: true,
        };
        let out = agg.aggregate(&req).await;
        assert_eq!(out.sources_attempted, ["wire"]);
        assert_eq!(out.items.len(), 3);
        assert_eq!(transport.calls_to("search.test"), 0);
    }

    #[tokio::test]
    async fn per_feed_timeout_shortens_the_stage_budget() {
        let mut registry = Registry::from_toml_str(FEEDS).unwrap();
        registry.feeds.national[1].timeout_ms = Some(50);
        let t = MockTransport::new()
            .route("search.test", hoops(1, "search.test"))
            .route("wire.test", hoops(1, "wire.test").delayed(Duration::from_millis(100)))
            .route("desk.test", hoops(1, "desk.test").delayed(Duration::from_millis(300)));
        let agg = Aggregator::build(
            AggregatorConfig::default(),
            registry,
            MergeEngine::new(TopicFilter::default_seed(), SourceTiers::default_seed()),
            Arc::new(t),
            Arc::new(ManualClock::new(0)),
        );
        let out = agg
            .aggregate(&AggregateRequest::for_topic("duke-blue-devils").with_national(true))
            .await;
        assert_eq!(out.errors, ["desk: timed out after 50ms"]);
        assert_eq!(out.items.len(), 2);
    }

    #[test]
    fn latency_bound_is_primary_plus_slowest_follow_up() {
        let (agg, _) = aggregator(MockTransport::new());
        assert_eq!(agg.worst_case_latency(), Duration::from_millis(15_000));
    }
}
