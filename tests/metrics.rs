// tests/metrics.rs
//
// One test per process: the Prometheus recorder is global.

use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use sports_news_aggregator::cache::ManualClock;
use sports_news_aggregator::config::AggregatorConfig;
use sports_news_aggregator::ingest::mock::{MockResponse, MockTransport};
use sports_news_aggregator::merge::MergeEngine;
use sports_news_aggregator::metrics::Metrics;
use sports_news_aggregator::registry::Registry;
use sports_news_aggregator::source_tiers::SourceTiers;
use sports_news_aggregator::topic_filter::TopicFilter;
use sports_news_aggregator::{api, AggregateRequest, Aggregator};

#[tokio::test]
async fn metrics_endpoint_contains_expected_series() {
    let metrics = Metrics::init().expect("first recorder install");
    assert!(Metrics::init().is_err(), "second install must fail");

    let transport = MockTransport::new()
        .route(
            "news.google.com",
            MockResponse::rss(&[("Duke basketball wins", "https://www.espn.com/1", "")]),
        )
        .route("cbssports.com", MockResponse::Status(503));
    let aggregator = Arc::new(Aggregator::build(
        AggregatorConfig::default(),
        Registry::builtin().unwrap(),
        MergeEngine::new(TopicFilter::default_seed(), SourceTiers::default_seed()),
        Arc::new(transport),
        Arc::new(ManualClock::new(0)),
    ));
    let req = AggregateRequest::for_topic("duke-blue-devils").with_national(true);
    aggregator.aggregate(&req).await;
    aggregator.aggregate(&req).await;

    let app = api::router(aggregator).merge(metrics.router());
    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for series in [
        "news_fetch_total",
        "news_source_errors_total",
        "news_cache_hits_total",
        "news_fetch_ms",
        "news_aggregate_ms",
        "news_items_returned",
        "news_cache_ttl_secs",
    ] {
        assert!(text.contains(series), "missing {series} in:\n{text}");
    }
    assert!(text.contains(r#"source="cbs""#), "{text}");
    assert!(text.contains(r#"outcome="cached""#), "{text}");
}
