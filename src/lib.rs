// src/lib.rs
// Public library surface for the service binary, the one-shot CLI and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod merge;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod source_tiers;
pub mod topic_filter;

pub use crate::api::router;
pub use crate::orchestrator::{AggregateRequest, AggregationResult, Aggregator};

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cache::SystemClock;
use crate::config::AggregatorConfig;
use crate::ingest::transport::{FeedTransport, HttpTransport};
use crate::merge::MergeEngine;
use crate::registry::Registry;
use crate::source_tiers::SourceTiers;
use crate::topic_filter::TopicFilter;

pub const DEFAULT_LOG_FILTER: &str = "sports_news_aggregator=info,aggregate=info,fetch=info,warn";

/// Install the global subscriber: `RUST_LOG` (default [`DEFAULT_LOG_FILTER`]),
/// JSON lines when `LOG_FORMAT=json`, compact otherwise. A second call is a no-op.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

/// Build a live aggregator from the on-disk configuration stack.
pub fn aggregator_from_env() -> Result<Aggregator> {
    let config = AggregatorConfig::load_default()?;
    let registry = Registry::load_default()?;
    let filter = TopicFilter::load_default()?;
    let tiers = SourceTiers::load_default();

    let transport = HttpTransport::new(
        &config.fetch.user_agent,
        &config.fetch.accept,
        Duration::from_millis(config.fetch.connect_timeout_ms),
    )
    .context("building http client")?;

    info!(
        transport = transport.name(),
        topics = registry.topics.len(),
        national = registry.feeds.national.len(),
        topic_feeds = registry.feeds.topic_feeds.len(),
        fallback = %registry.feeds.fallback.id,
        primary_ms = config.timeouts.primary_ms,
        secondary_ms = config.timeouts.secondary_ms,
        parse_failure = ?config.fetch.parse_failure,
        "aggregator configured"
    );

    Ok(Aggregator::build(
        config,
        registry,
        MergeEngine::new(filter, tiers),
        Arc::new(transport),
        Arc::new(SystemClock),
    ))
}
