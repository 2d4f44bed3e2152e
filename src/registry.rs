// src/registry.rs
//! Topic + feed reference data.
//!
//! Both registries come from one TOML document (`config/feeds.toml`). The
//! shipped file is compiled in as the built-in default, so a deployment
//! without a config directory still has the full data set.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::ingest::types::{FeedCategory, FeedDescriptor};

pub const ENV_FEED_REGISTRY_PATH: &str = "FEED_REGISTRY_PATH";
pub const DEFAULT_FEED_REGISTRY_PATH: &str = "config/feeds.toml";

const BUILTIN_REGISTRY: &str = include_str!("../config/feeds.toml");

/// Name + search keywords for one subject (a team).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopicDescriptor {
    pub id: String,
    pub display_name: String,
    pub search_keywords: String,
}

impl TopicDescriptor {
    /// Best-effort descriptor for an id the registry doesn't know:
    /// `acme-tigers` → `Acme Tigers`, keywords `Acme Tigers <suffix>`.
    pub fn synthesize(id: &str, keyword_suffix: &str) -> Self {
        let display_name = id
            .split(['-', '_', ' '])
            .filter(|w| !w.is_empty())
            .map(title_case)
            .collect::<Vec<_>>()
            .join(" ");
        let suffix = keyword_suffix.trim();
        let search_keywords = if suffix.is_empty() {
            display_name.clone()
        } else {
            format!("{display_name} {suffix}")
        };
        Self {
            id: id.to_string(),
            display_name,
            search_keywords,
        }
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct TopicRegistry {
    by_id: HashMap<String, TopicDescriptor>,
}

impl TopicRegistry {
    pub fn new(topics: Vec<TopicDescriptor>) -> Self {
        Self {
            by_id: topics.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    pub fn resolve_topic(&self, id: &str) -> Option<&TopicDescriptor> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FeedRegistry {
    /// Search feed; its url carries a `{query}` placeholder.
    pub primary: FeedDescriptor,
    pub national: Vec<FeedDescriptor>,
    pub topic_feeds: HashMap<String, Vec<FeedDescriptor>>,
    /// Single low-cost source for the minimal fallback stage.
    pub fallback: FeedDescriptor,
}

impl FeedRegistry {
    pub fn topic_feeds_for(&self, topic_id: &str) -> &[FeedDescriptor] {
        self.topic_feeds
            .get(topic_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    id: String,
    display_name: String,
    url: String,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

impl FeedEntry {
    fn into_descriptor(self, category: FeedCategory) -> Result<FeedDescriptor> {
        if self.timeout_ms == Some(0) {
            bail!("feed {:?}: timeout_ms must be > 0", self.id);
        }
        Ok(FeedDescriptor {
            id: self.id,
            display_name: self.display_name,
            url: self.url,
            category,
            timeout_ms: self.timeout_ms,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    fallback_id: String,
    primary: FeedEntry,
    #[serde(default)]
    national: Vec<FeedEntry>,
    #[serde(default)]
    topic_feeds: HashMap<String, Vec<FeedEntry>>,
    #[serde(default)]
    topics: Vec<TopicDescriptor>,
}

/// Both registries, loaded together.
#[derive(Debug, Clone)]
pub struct Registry {
    pub topics: TopicRegistry,
    pub feeds: FeedRegistry,
}

impl Registry {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: RegistryFile = toml::from_str(s).context("parsing feed registry")?;

        if !file.primary.url.contains("{query}") {
            bail!("primary feed url must contain a {{query}} placeholder");
        }
        let primary = file.primary.into_descriptor(FeedCategory::PrimarySearch)?;
        let national = file
            .national
            .into_iter()
            .map(|f| f.into_descriptor(FeedCategory::National))
            .collect::<Result<Vec<_>>>()?;
        let fallback = national
            .iter()
            .find(|f| f.id == file.fallback_id)
            .cloned()
            .ok_or_else(|| anyhow!("fallback_id {:?} is not a national feed", file.fallback_id))?;
        let topic_feeds = file
            .topic_feeds
            .into_iter()
            .map(|(topic, feeds)| {
                let feeds = feeds
                    .into_iter()
                    .map(|f| f.into_descriptor(FeedCategory::TeamSpecific))
                    .collect::<Result<Vec<_>>>()?;
                Ok((topic, feeds))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self {
            topics: TopicRegistry::new(file.topics),
            feeds: FeedRegistry {
                primary,
                national,
                topic_feeds,
                fallback,
            },
        })
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feed registry from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid feed registry at {}", path.display()))
    }

    /// Reference data compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_REGISTRY)
    }

    /// 1) $FEED_REGISTRY_PATH (must exist)
    /// 2) config/feeds.toml
    /// 3) built-in data
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_FEED_REGISTRY_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_FEED_REGISTRY_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from_file(&pb);
        }
        let default_path = Path::new(DEFAULT_FEED_REGISTRY_PATH);
        if default_path.exists() {
            return Self::load_from_file(default_path);
        }
        Self::builtin()
    }
}
