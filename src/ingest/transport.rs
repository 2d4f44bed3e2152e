// src/ingest/transport.rs
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

/// Low-level HTTP GET. Separated from the fetcher so tests can swap in
/// canned responses; timeouts are enforced by the caller via cancellation.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Body text of a 2xx response; non-2xx is an error reading `HTTP <status>`.
    async fn get_text(&self, url: &str) -> Result<String>;

    fn name(&self) -> &'static str;
}

pub struct HttpTransport {
    http: reqwest::Client,
    accept: String,
}

impl HttpTransport {
    pub fn new(user_agent: &str, accept: &str, connect_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            http,
            accept: accept.to_string(),
        })
    }
}

#[async_trait]
impl FeedTransport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, &self.accept)
            .send()
            .await
            .map_err(|e| anyhow!("request failed: {e}"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP {}", status.as_u16()));
        }
        resp.text().await.context("reading response body")
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}
