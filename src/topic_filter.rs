// src/topic_filter.rs
//! Topic filter: a two-tier keyword classifier for headlines.
//!
//! Every check lowercases the title, rejects on any exclusion phrase, then
//! accepts on any allow phrase. The loose tier differs only in its allow list.
//! An empty title never matches.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs};

pub const ENV_TOPIC_FILTER_PATH: &str = "TOPIC_FILTER_PATH";
pub const DEFAULT_TOPIC_FILTER_PATH: &str = "config/topic_filter.toml";

/// Word lists as they appear in `config/topic_filter.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicFilterConfig {
    pub allow: Vec<String>,
    pub loose_allow: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TopicFilter {
    allow: Vec<String>,
    loose_allow: Vec<String>,
    exclude: Vec<String>,
}

impl TopicFilter {
    pub fn new(cfg: TopicFilterConfig) -> Self {
        Self {
            allow: lower_all(cfg.allow),
            loose_allow: lower_all(cfg.loose_allow),
            exclude: lower_all(cfg.exclude),
        }
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: TopicFilterConfig = toml::from_str(s)?;
        Ok(Self::new(cfg))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read topic filter at {}: {}", path.display(), e)
        })?;
        Self::from_toml_str(&content)
    }

    /// $TOPIC_FILTER_PATH, else config/topic_filter.toml, else the built-in men's
    /// college basketball lists.
    pub fn load_default() -> anyhow::Result<Self> {
        let path = env::var(ENV_TOPIC_FILTER_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOPIC_FILTER_PATH));
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            tracing::info!(path = %path.display(), "topic filter file missing; using built-in lists");
            Ok(Self::default_seed())
        }
    }

    /// Built-in lists for men's college basketball.
    pub fn default_seed() -> Self {
        let to_vec = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self::new(TopicFilterConfig {
            allow: to_vec(&[
                "men's basketball",
                "mens basketball",
                "men's hoops",
                "mens hoops",
                "mbb",
                "ncaa men's",
                "men's college basketball",
                "college basketball",
                "men's ncaa",
                "basketball",
            ]),
            loose_allow: to_vec(&[
                "college basketball",
                "basketball",
                "ncaa",
                "march madness",
                "final four",
                "bracket",
            ]),
            exclude: to_vec(&[
                "women",
                "wbb",
                "women's basketball",
                "softball",
                "football",
                "baseball",
                "soccer",
                "volleyball",
                "hockey",
                "gymnastics",
            ]),
        })
    }

    /// Strict tier.
    pub fn is_topic_match(&self, title: &str) -> bool {
        self.check(title, &self.allow)
    }

    /// Loose tier: same exclusions, broader allow list.
    pub fn is_topic_match_loose(&self, title: &str) -> bool {
        self.check(title, &self.loose_allow)
    }

    fn check(&self, title: &str, allow: &[String]) -> bool {
        let t = title.trim().to_lowercase();
        if t.is_empty() {
            return false;
        }
        if self.exclude.iter().any(|ex| t.contains(ex.as_str())) {
            return false;
        }
        allow.iter().any(|al| t.contains(al.as_str()))
    }
}

fn lower_all(v: Vec<String>) -> Vec<String> {
    v.into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
