// src/merge.rs
//! Merge / dedupe / topic-filter / rank.
//!
//! - Merge: concatenate lists in the order given (source order is preserved).
//! - Dedupe: key is `link`, or `title-pubDate` when the link is empty; first wins.
//! - Filter: strict tier; if that leaves nothing from a non-empty set, loose tier.
//! - Rank: stable sort by (source tier asc, publish time desc). Unparseable or
//!   missing dates count as the epoch.

use std::collections::HashSet;

use chrono::DateTime;
use tracing::debug;

use crate::ingest::types::NewsItem;
use crate::source_tiers::SourceTiers;
use crate::topic_filter::TopicFilter;

/// Which filter tier produced the final set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTier {
    Strict,
    Loose,
    /// Nothing to filter.
    Empty,
}

pub struct MergeEngine {
    filter: TopicFilter,
    tiers: SourceTiers,
}

impl MergeEngine {
    pub fn new(filter: TopicFilter, tiers: SourceTiers) -> Self {
        Self { filter, tiers }
    }

    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    pub fn tiers(&self) -> &SourceTiers {
        &self.tiers
    }

    pub fn process(&self, lists: Vec<Vec<NewsItem>>) -> Vec<NewsItem> {
        let candidates = lists.into_iter().flatten().collect::<Vec<_>>();
        let total = candidates.len();
        let deduped = dedupe(candidates);
        let deduped_len = deduped.len();
        let (filtered, tier) = self.apply_topic_filter(deduped);
        debug!(
            target: "aggregate",
            candidates = total,
            deduped = deduped_len,
            kept = filtered.len(),
            filter = ?tier,
            "merge pass"
        );
        self.rank(filtered)
    }

    /// Strict first; loose only when strict kept nothing out of something.
    pub fn apply_topic_filter(&self, items: Vec<NewsItem>) -> (Vec<NewsItem>, FilterTier) {
        if items.is_empty() {
            return (items, FilterTier::Empty);
        }
        let strict = items
            .iter()
            .filter(|it| self.filter.is_topic_match(&it.title))
            .cloned()
            .collect::<Vec<_>>();
        if !strict.is_empty() {
            return (strict, FilterTier::Strict);
        }
        let loose = items
            .into_iter()
            .filter(|it| self.filter.is_topic_match_loose(&it.title))
            .collect();
        (loose, FilterTier::Loose)
    }

    pub fn rank(&self, items: Vec<NewsItem>) -> Vec<NewsItem> {
        let mut keyed = items
            .into_iter()
            .map(|it| (self.tiers.tier_for(&it.source_name), published_ms(&it.published_at), it))
            .collect::<Vec<_>>();
        // sort_by is stable: equal keys keep merge order
        keyed.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
        keyed.into_iter().map(|(_, _, it)| it).collect()
    }
}

/// Drop later items whose dedupe key was already seen.
pub fn dedupe(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|it| seen.insert(it.dedupe_key()))
        .collect()
}

/// Publish time in unix millis; RFC 2822 (RSS) or RFC 3339 (Atom), else 0.
pub fn published_ms(raw: &str) -> i64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0;
    }
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}
