//! # Source Tiers
//!
//! Maps a headline's source name to a trust tier (lower = more trusted).
//!
//! - Rules are an ordered list of `(matcher, tier)`; the first matching rule wins.
//! - Source names are normalized before matching: lowercase, all whitespace removed.
//! - Unmatched sources get `default_tier`, which sorts after every rule.
//! - Loads from JSON config; falls back to `default_seed()` on any error.

use serde::Deserialize;
use std::{env, fs, path::Path};

pub const ENV_SOURCE_TIERS_PATH: &str = "SOURCE_TIERS_PATH";
pub const DEFAULT_SOURCE_TIERS_PATH: &str = "config/source_tiers.json";

/// How a rule compares against the normalized source name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum SourceMatcher {
    /// Normalized name contains the needle anywhere.
    Contains(String),
    /// Normalized name equals the needle.
    Exact(String),
}

impl SourceMatcher {
    fn matches(&self, normalized: &str) -> bool {
        match self {
            SourceMatcher::Contains(needle) => normalized.contains(needle.as_str()),
            SourceMatcher::Exact(needle) => normalized == needle,
        }
    }

    fn normalized(self) -> Self {
        match self {
            SourceMatcher::Contains(n) => SourceMatcher::Contains(normalize(&n)),
            SourceMatcher::Exact(n) => SourceMatcher::Exact(normalize(&n)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TierRule {
    pub matcher: SourceMatcher,
    pub tier: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceTiers {
    #[serde(default = "default_default_tier")]
    pub default_tier: u32,
    #[serde(default)]
    pub rules: Vec<TierRule>,
}

fn default_default_tier() -> u32 {
    99
}

impl SourceTiers {
    pub fn new(rules: Vec<TierRule>, default_tier: u32) -> Self {
        Self {
            default_tier,
            rules: rules
                .into_iter()
                .map(|r| TierRule {
                    matcher: r.matcher.normalized(),
                    tier: r.tier,
                })
                .collect(),
        }
    }

    /// Load configuration from a JSON file.
    /// Falls back to `default_seed()` on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => match serde_json::from_str::<SourceTiers>(&s) {
                Ok(cfg) => Self::new(cfg.rules, cfg.default_tier),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "invalid source tiers; using built-in seed");
                    Self::default_seed()
                }
            },
            Err(_) => Self::default_seed(),
        }
    }

    /// $SOURCE_TIERS_PATH, else config/source_tiers.json, else the seed.
    pub fn load_default() -> Self {
        let path = env::var(ENV_SOURCE_TIERS_PATH)
            .unwrap_or_else(|_| DEFAULT_SOURCE_TIERS_PATH.to_string());
        Self::load_from_file(path)
    }

    /// Tier for a source name.
    pub fn tier_for(&self, source: &str) -> u32 {
        let s = normalize(source);
        self.rules
            .iter()
            .find(|r| r.matcher.matches(&s))
            .map(|r| r.tier)
            .unwrap_or(self.default_tier)
    }

    /// Built-in seed with the national outlets the aggregator reads.
    pub fn default_seed() -> Self {
        let rules = [
            ("espn", 1),
            ("ncaa.com", 2),
            ("ncaa", 2),
            ("cbs", 3),
            ("cbssports", 3),
            ("yahoo", 4),
            ("yahoosports", 4),
        ]
        .into_iter()
        .map(|(needle, tier)| TierRule {
            matcher: SourceMatcher::Contains(needle.to_string()),
            tier,
        })
        .collect();
        Self::new(rules, 99)
    }
}

/// Lowercase and drop every whitespace character.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
