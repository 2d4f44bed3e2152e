// src/ingest/mod.rs
pub mod fetcher;
pub mod mock;
pub mod parser;
pub mod transport;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "news_fetch_total",
            "Feed fetches by source and outcome (live/cached/stale/failed)."
        );
        describe_counter!(
            "news_source_errors_total",
            "Feed fetches that failed before any stale fallback."
        );
        describe_counter!("news_cache_hits_total", "Fetches answered from a fresh cache entry.");
        describe_counter!(
            "news_stale_served_total",
            "Failed fetches answered from an expired cache entry."
        );
        describe_histogram!("news_fetch_ms", "Upstream fetch + parse time in milliseconds.");
        describe_histogram!("news_aggregate_ms", "End-to-end aggregation time in milliseconds.");
        describe_histogram!("news_items_returned", "Items returned per aggregation.");
        describe_gauge!("news_cache_ttl_secs", "Configured cache TTL per cache tier.");
    });
}

/// Normalize a headline: decode entities, strip tags, ASCII-fy quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// `https://www.espn.com/x` → `espn`. `None` for empty or unparseable links.
pub fn source_from_link(link: &str) -> Option<String> {
    let url = reqwest::Url::parse(link.trim()).ok()?;
    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    host.split('.')
        .next()
        .filter(|label| !label.is_empty())
        .map(str::to_string)
}
