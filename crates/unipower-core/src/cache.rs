// ── Status cache ──
//
// TTL-bounded snapshots of normalized device status, keyed by scope.
// Reads are lock-free (`DashMap`); fills happen in the engine under the
// controller lock, which is what keeps a miss to a single fetch.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::trace;

use crate::model::DeviceStatus;

/// What a cached snapshot covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Every power device in a site (by internal site name).
    Site(String),
    /// One device (by controller id).
    Device(String),
}

#[derive(Debug)]
struct CacheEntry {
    value: Arc<Vec<DeviceStatus>>,
    expires_at: Instant,
}

/// Time-bounded store of device status snapshots.
#[derive(Debug)]
pub struct StatusCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl StatusCache {
    /// `ttl` is expected to be clamped already (see `EngineConfig`).
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fresh snapshot for `key`, if any. Expired entries are evicted.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<DeviceStatus>>> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .and_then(|entry| (entry.expires_at > now).then(|| Arc::clone(&entry.value)));

        if hit.is_none() {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        trace!(?key, hit = hit.is_some(), "status cache lookup");
        hit
    }

    /// Store a snapshot under the cache's TTL.
    pub fn set(&self, key: CacheKey, value: Vec<DeviceStatus>) -> Arc<Vec<DeviceStatus>> {
        self.set_with_ttl(key, value, self.ttl)
    }

    pub fn set_with_ttl(
        &self,
        key: CacheKey,
        value: Vec<DeviceStatus>,
        ttl: Duration,
    ) -> Arc<Vec<DeviceStatus>> {
        let value = Arc::new(value);
        self.entries.insert(
            key,
            CacheEntry {
                value: Arc::clone(&value),
                expires_at: Instant::now() + ttl,
            },
        );
        value
    }

    pub fn invalidate(&self, key: &CacheKey) {
        if self.entries.remove(key).is_some() {
            trace!(?key, "status cache entry invalidated");
        }
    }
}
