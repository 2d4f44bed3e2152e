//! # Per-Source Cache
//!
//! Short-TTL memoization of feed results, keyed by feed identity + resolved URL.
//!
//! - `get` only returns entries still inside their TTL.
//! - `get_stale` ignores expiry; callers use it only after a confirmed fetch failure.
//! - `set` replaces the whole entry; values are immutable `Arc`s, so a concurrent
//!   reader sees either the old or the new list, never a mix.
//!
//! The map is unbounded. Sources are a fixed, small set (tens of keys), so TTL
//! expiry bounds staleness, not memory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::ingest::types::NewsItem;

/// Wall-clock source in unix milliseconds. Injected so expiry is testable.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Real time via `chrono`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct CacheEntry {
    pub items: Arc<Vec<NewsItem>>,
    pub expires_at_ms: i64,
}

pub struct FeedCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
}

impl FeedCache {
    /// A zero TTL is bumped to 1ms so entries are always readable at least once.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let ttl = if ttl.is_zero() {
            Duration::from_millis(1)
        } else {
            ttl
        };
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Items for `key` if present and `now <= expires_at`.
    pub fn get(&self, key: &str) -> Option<Vec<NewsItem>> {
        let now = self.clock.now_ms();
        let guard = self.read();
        let entry = guard.get(key)?;
        if now > entry.expires_at_ms {
            return None;
        }
        Some(entry.items.as_ref().clone())
    }

    /// Items for `key` regardless of expiry.
    pub fn get_stale(&self, key: &str) -> Option<Vec<NewsItem>> {
        self.read().get(key).map(|e| e.items.as_ref().clone())
    }

    pub fn set(&self, key: &str, items: Vec<NewsItem>) {
        let entry = Arc::new(CacheEntry {
            items: Arc::new(items),
            expires_at_ms: self
                .clock
                .now_ms()
                .saturating_add(i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)),
        });
        self.write().insert(key.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<CacheEntry>>> {
        match self.entries.read() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<CacheEntry>>> {
        match self.entries.write() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

/// `<feed id>|<resolved url>`
pub fn cache_key(feed_id: &str, resolved_url: &str) -> String {
    format!("{feed_id}|{resolved_url}")
}
