use crate::types::RawLedgerRecord;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedResponse {
    records: Vec<RawLedgerRecord>,
    fetched_at: Instant,
}

/// In-process response cache keyed by full request URL.
///
/// Entries older than the TTL are treated as misses and dropped by
/// [`FetchCache::purge_expired`]. Concurrent writers race, last write wins.
#[derive(Debug)]
pub struct FetchCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedResponse>>,
}

impl FetchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh records for `url`, if any
    pub fn get(&self, url: &str) -> Option<Vec<RawLedgerRecord>> {
        let entries = self.entries.read().ok()?;
        let cached = entries.get(url)?;

        if cached.fetched_at.elapsed() < self.ttl {
            Some(cached.records.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, url: &str, records: Vec<RawLedgerRecord>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                url.to_string(),
                CachedResponse {
                    records,
                    fetched_at: Instant::now(),
                },
            );
        }
    }

    /// Remove expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };

        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, cached| cached.fetched_at.elapsed() < ttl);
        let removed = before - entries.len();

        if removed > 0 {
            debug!("Purged {} expired fetch cache entries", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
