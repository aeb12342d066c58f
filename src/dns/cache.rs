//! TTL cache of resolved addresses.

use super::{AnswerSet, Name, RecordType};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default lifetime for answers without an upstream TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    answers: AnswerSet,
    inserted_at: Instant,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Thread-safe address cache keyed by (hostname, record type).
///
/// Expired entries read as a miss and are dropped on the lookup that finds
/// them. Concurrent writers for the same key race; the last one wins.
#[derive(Clone)]
pub struct AddressCache {
    entries: Arc<DashMap<(Name, RecordType), CacheEntry>>,
    capacity: Option<usize>,
}

impl Default for AddressCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressCache {
    /// Create an unbounded cache.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            capacity: None,
        }
    }

    /// Create a cache holding at most `capacity` entries. When full, the
    /// oldest insertion is evicted.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    /// Live answers for `name`, if any.
    pub fn get(&self, name: &Name, record_type: RecordType) -> Option<AnswerSet> {
        let key = (name.clone(), record_type);
        let now = Instant::now();

        if let Some(entry) = self.entries.get(&key) {
            if !entry.is_expired(now) {
                return Some(entry.answers.clone());
            }
        } else {
            return None;
        }

        // Re-check under the write lock: a fresh put may have raced in.
        self.entries.remove_if(&key, |_, entry| entry.is_expired(now));
        tracing::trace!(domain = %name, %record_type, "cache entry expired");
        None
    }

    /// Stores `answers` for `ttl`. Empty sets and zero TTLs are not stored.
    pub fn put(&self, name: Name, record_type: RecordType, answers: AnswerSet, ttl: Duration) {
        if answers.is_empty() || ttl.is_zero() {
            return;
        }

        let now = Instant::now();
        let key = (name, record_type);

        if let Some(capacity) = self.capacity {
            if capacity == 0 {
                return;
            }
            if !self.entries.contains_key(&key) && self.entries.len() >= capacity {
                self.purge_expired();
                if self.entries.len() >= capacity {
                    self.evict_oldest();
                }
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                answers,
                inserted_at: now,
                expires_at: now + ttl,
            },
        );
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            tracing::trace!(domain = %key.0, record_type = %key.1, "cache full, evicting");
            self.entries.remove(&key);
        }
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    /// Forget a host, both record types.
    pub fn remove(&self, name: &Name) {
        self.entries.remove(&(name.clone(), RecordType::A));
        self.entries.remove(&(name.clone(), RecordType::AAAA));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl std::fmt::Debug for AddressCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
