// tests/feed_fixtures.rs
//
// Real-world shaped feed documents through the full fetch path
// (transport → parser → normalization → cache).

use std::sync::Arc;
use std::time::Duration;

use sports_news_aggregator::cache::{FeedCache, ManualClock};
use sports_news_aggregator::config::ParseFailurePolicy;
use sports_news_aggregator::ingest::fetcher::{FeedFetcher, NO_TITLE};
use sports_news_aggregator::ingest::mock::{MockResponse, MockTransport};
use sports_news_aggregator::ingest::types::{FeedCategory, FeedDescriptor, Freshness, NewsItem};
use sports_news_aggregator::merge::MergeEngine;
use sports_news_aggregator::source_tiers::SourceTiers;
use sports_news_aggregator::topic_filter::TopicFilter;

const GOOGLE: &str = include_str!("fixtures/google_news.xml");
const ATOM: &str = include_str!("fixtures/blog_atom.xml");
const RDF: &str = include_str!("fixtures/rdf.xml");

fn fetcher(transport: MockTransport) -> FeedFetcher {
    let clock = Arc::new(ManualClock::new(0));
    FeedFetcher::new(
        Arc::new(transport),
        Arc::new(FeedCache::new(Duration::from_secs(600), clock.clone())),
        Arc::new(FeedCache::new(Duration::from_secs(420), clock)),
        ParseFailurePolicy::Lenient,
    )
}

async fn fetch_body(body: &str, feed: &FeedDescriptor, topic: Option<&str>) -> Vec<NewsItem> {
    let f = fetcher(MockTransport::new().route("fixture.test", MockResponse::Body(body.to_string())));
    let out = f.fetch(feed, &feed.url, Duration::from_secs(1), topic).await;
    assert!(out.ok, "{:?}", out.error);
    assert_eq!(out.freshness, Some(Freshness::Live));
    out.items
}

#[tokio::test]
async fn google_news_search_results() {
    let feed = FeedDescriptor::new(
        "google",
        "Google News",
        "https://fixture.test/rss/search?q=x",
        FeedCategory::PrimarySearch,
    );
    let items = fetch_body(GOOGLE, &feed, Some("kansas-jayhawks")).await;
    assert_eq!(items.len(), 3);

    assert_eq!(items[0].title, "Kansas basketball holds off Baylor - takeaways - ESPN");
    assert_eq!(items[0].source_name, "ESPN");
    assert_eq!(items[0].published_at, "Tue, 04 Feb 2025 03:15:00 GMT");
    assert_eq!(items[0].origin_category, FeedCategory::PrimarySearch);
    assert_eq!(items[0].topic_key.as_deref(), Some("kansas-jayhawks"));

    // CDATA with inline markup
    assert_eq!(items[1].title, "Bill Self on the Jayhawks' men's basketball rotation");
    assert_eq!(items[1].source_name, "KUsports.com");

    // filtered + ranked: women's story dropped, ESPN first
    let engine = MergeEngine::new(TopicFilter::default_seed(), SourceTiers::default_seed());
    let ranked = engine.process(vec![items]);
    let sources = ranked.iter().map(|i| i.source_name.as_str()).collect::<Vec<_>>();
    assert_eq!(sources, ["ESPN", "KUsports.com"]);
}

#[tokio::test]
async fn atom_blog_prefers_alternate_links() {
    let feed = FeedDescriptor::new(
        "rockchalktalk",
        "Rock Chalk Talk",
        "https://fixture.test/rss/current.xml",
        FeedCategory::TeamSpecific,
    );
    let items = fetch_body(ATOM, &feed, Some("kansas-jayhawks")).await;
    assert_eq!(items.len(), 2);

    assert_eq!(items[0].link, "https://www.rockchalktalk.com/2025/2/4/film");
    assert_eq!(items[0].published_at, "2025-02-04T09:30:00-05:00");
    assert_eq!(items[0].source_name, "rockchalktalk");

    assert_eq!(items[1].title, NO_TITLE);
    assert_eq!(items[1].link, "https://www.rockchalktalk.com/2025/2/3/open-thread");
    assert_eq!(items[1].published_at, "2025-02-03T08:00:00-05:00");
}

#[tokio::test]
async fn rdf_items_are_read() {
    let feed = FeedDescriptor::new("wire", "Wire", "https://fixture.test/wire.rdf", FeedCategory::National);
    let items = fetch_body(RDF, &feed, None).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "College basketball: bubble watch");
    assert_eq!(items[0].link, "https://wire.example/1");
    assert_eq!(items[0].published_at, "");
    assert_eq!(items[0].source_name, "wire");
    assert_eq!(items[0].topic_key, None);
}

#[tokio::test]
async fn atom_source_block_falls_back_to_link_host() {
    let body = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title>Duke basketball rallies late</title>
    <link href="https://www.espn.com/x"/>
    <source>
      <id>urn:uuid:abc</id>
      <title>Team Blog</title>
      <updated>2025-02-04T00:00:00Z</updated>
    </source>
  </entry>
</feed>"#;
    let feed = FeedDescriptor::new("blog", "Blog", "https://fixture.test/atom", FeedCategory::TeamSpecific);
    let items = fetch_body(body, &feed, Some("duke-blue-devils")).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source_name, "espn");
    assert_eq!(items[0].title, "Duke basketball rallies late");
}
