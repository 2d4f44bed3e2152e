// src/ingest/mock.rs
//! In-memory `FeedTransport` for tests and offline runs.
//!
//! Routes are matched by substring against the requested URL, first match wins.
//! Unrouted URLs fail like a refused connection.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::ingest::transport::FeedTransport;

#[derive(Debug, Clone)]
pub enum MockResponse {
    Body(String),
    Status(u16),
    Error(String),
    Delayed(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn rss(items: &[(&str, &str, &str)]) -> Self {
        MockResponse::Body(rss_body(items))
    }

    pub fn delayed(self, by: Duration) -> Self {
        MockResponse::Delayed(by, Box::new(self))
    }
}

/// Build a minimal RSS 2.0 document from `(title, link, pubDate)` triples.
pub fn rss_body(items: &[(&str, &str, &str)]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>mock</title>");
    for (title, link, date) in items {
        out.push_str("<item>");
        out.push_str(&format!("<title>{}</title>", html_escape::encode_text(title)));
        if !link.is_empty() {
            out.push_str(&format!("<link>{}</link>", html_escape::encode_text(link)));
        }
        if !date.is_empty() {
            out.push_str(&format!("<pubDate>{date}</pubDate>"));
        }
        out.push_str("</item>");
    }
    out.push_str("</channel></rss>");
    out
}

#[derive(Default)]
pub struct MockTransport {
    routes: Vec<(String, MockResponse)>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url_contains: &str, response: MockResponse) -> Self {
        self.routes.push((url_contains.to_string(), response));
        self
    }

    /// Number of requests whose URL contains `url_contains`.
    pub fn calls_to(&self, url_contains: &str) -> usize {
        self.calls
            .lock()
            .map(|c| {
                c.iter()
                    .filter(|(u, _)| u.contains(url_contains))
                    .map(|(_, n)| *n)
                    .sum()
            })
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().map(|c| c.values().sum()).unwrap_or(0)
    }

    fn record(&self, url: &str) {
        if let Ok(mut c) = self.calls.lock() {
            *c.entry(url.to_string()).or_insert(0) += 1;
        }
    }
}

#[async_trait]
impl FeedTransport for MockTransport {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.record(url);
        let Some((_, resp)) = self.routes.iter().find(|(pat, _)| url.contains(pat.as_str())) else {
            return Err(anyhow!("request failed: connection refused"));
        };
        let mut resp = resp.clone();
        loop {
            match resp {
                MockResponse::Body(b) => return Ok(b),
                MockResponse::Status(code) => return Err(anyhow!("HTTP {code}")),
                MockResponse::Error(msg) => return Err(anyhow!("{msg}")),
                MockResponse::Delayed(by, inner) => {
                    tokio::time::sleep(by).await;
                    resp = *inner;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
