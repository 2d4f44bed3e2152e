// src/config/aggregator.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

pub const ENV_AGGREGATOR_CONFIG_PATH: &str = "AGGREGATOR_CONFIG_PATH";
pub const DEFAULT_AGGREGATOR_CONFIG_PATH: &str = "config/aggregator.toml";

pub const ENV_PRIMARY_TIMEOUT_MS: &str = "NEWS_PRIMARY_TIMEOUT_MS";
pub const ENV_SECONDARY_TIMEOUT_MS: &str = "NEWS_SECONDARY_TIMEOUT_MS";
pub const ENV_PARSE_FAILURE: &str = "NEWS_PARSE_FAILURE";

/// What an unparseable 2xx body means for the source that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseFailurePolicy {
    /// Same as a feed with zero items: `ok`, nothing cached, no error reported.
    #[default]
    Lenient,
    /// Same as a network failure: error reported, stale cache consulted.
    Fail,
}

impl ParseFailurePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Some(Self::Lenient),
            "fail" | "strict" => Some(Self::Fail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsCfg {
    pub primary_ms: u64,
    pub secondary_ms: u64,
    pub fallback_ms: u64,
}

impl Default for TimeoutsCfg {
    fn default() -> Self {
        Self {
            primary_ms: 10_000,
            secondary_ms: 5_000,
            fallback_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheCfg {
    /// TTL for ordinary RSS feeds.
    pub feed_ttl_secs: u64,
    /// TTL for the metered search source.
    pub search_ttl_secs: u64,
}

impl Default for CacheCfg {
    fn default() -> Self {
        Self {
            feed_ttl_secs: 600,
            search_ttl_secs: 420,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchCfg {
    pub recency_window_days: u32,
    /// Appended to a synthesized topic name to form its search keywords.
    pub keyword_suffix: String,
}

impl Default for SearchCfg {
    fn default() -> Self {
        Self {
            recency_window_days: 90,
            keyword_suffix: "basketball".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchCfg {
    pub user_agent: String,
    pub accept: String,
    pub connect_timeout_ms: u64,
    pub parse_failure: ParseFailurePolicy,
}

impl Default for FetchCfg {
    fn default() -> Self {
        Self {
            user_agent: "sports-news-aggregator/0.1".to_string(),
            accept: "application/rss+xml, application/xml, text/xml".to_string(),
            connect_timeout_ms: 3_000,
            parse_failure: ParseFailurePolicy::Lenient,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub timeouts: TimeoutsCfg,
    pub cache: CacheCfg,
    pub search: SearchCfg,
    pub fetch: FetchCfg,
}

impl AggregatorConfig {
    /// Parse from a TOML string and validate.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AggregatorConfig = toml::from_str(s).context("parsing aggregator config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading aggregator config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks:
    /// 1) $AGGREGATOR_CONFIG_PATH (must exist)
    /// 2) config/aggregator.toml
    /// 3) built-in defaults
    ///
    /// Env overrides are applied on top in every case.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_AGGREGATOR_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_AGGREGATOR_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                ));
            }
            Self::load_from_file(&pb)?
        } else {
            let pb = PathBuf::from(DEFAULT_AGGREGATOR_CONFIG_PATH);
            if pb.exists() {
                Self::load_from_file(&pb)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(ms) = parse_ms_env(ENV_PRIMARY_TIMEOUT_MS) {
            self.timeouts.primary_ms = ms;
        }
        if let Some(ms) = parse_ms_env(ENV_SECONDARY_TIMEOUT_MS) {
            self.timeouts.secondary_ms = ms;
        }
        if let Ok(raw) = env::var(ENV_PARSE_FAILURE) {
            match ParseFailurePolicy::parse(&raw) {
                Some(p) => self.fetch.parse_failure = p,
                None => tracing::warn!(value = %raw, "ignoring invalid {ENV_PARSE_FAILURE}"),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.timeouts;
        if t.primary_ms == 0 || t.secondary_ms == 0 || t.fallback_ms == 0 {
            return Err(anyhow!("timeouts must be > 0 ms"));
        }
        if self.cache.feed_ttl_secs == 0 || self.cache.search_ttl_secs == 0 {
            return Err(anyhow!("cache TTLs must be > 0 s"));
        }
        Ok(())
    }

    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.primary_ms)
    }

    pub fn secondary_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.secondary_ms)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.fallback_ms)
    }

    pub fn feed_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.feed_ttl_secs)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.search_ttl_secs)
    }
}

fn parse_ms_env(name: &str) -> Option<u64> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Some(v),
        _ => {
            tracing::warn!(value = %raw, "ignoring invalid {name}");
            None
        }
    }
}
