//! Warm-instance cache.
//!
//! Compiling a contract dominates the cost of a small call, so instances are
//! kept warm between executions, keyed by the blake3 hash of their code.
//! Reuse is only sound because every consumer goes through
//! [`crate::executor::Instance::reset`] first; an incompletely reset
//! instance leaks gas or breakpoints from the previous call.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tracing::{debug, trace};

use crate::executor::InstanceRef;

/// Default number of warm instances retained per runtime context.
pub const DEFAULT_WARM_INSTANCE_CACHE_SIZE: usize = 32;

/// Cache key: blake3 of the contract bytecode.
pub type CodeHash = [u8; 32];

/// Hashes contract code into its cache key.
pub fn code_hash(code: &[u8]) -> CodeHash {
    *blake3::hash(code).as_bytes()
}

/// Hit/miss/eviction counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Size-bounded LRU pool of reusable instances.
///
/// An entry whose `Arc` is also held elsewhere (the current-instance slot or
/// the instance stack) is pinned: eviction skips it, temporarily letting the
/// cache exceed its capacity rather than freeing a live instance.
pub struct WarmInstanceCache {
    entries: LruCache<CodeHash, InstanceRef>,
    capacity: usize,
    stats: CacheStats,
}

impl WarmInstanceCache {
    pub fn new(capacity: usize) -> Self {
        WarmInstanceCache {
            entries: LruCache::unbounded(),
            capacity: NonZeroUsize::new(capacity)
                .unwrap_or(NonZeroUsize::MIN)
                .get(),
            stats: CacheStats::default(),
        }
    }

    /// Looks up a warm instance, marking it most recently used.
    pub fn get(&mut self, key: &CodeHash) -> Option<InstanceRef> {
        match self.entries.get(key) {
            Some(instance) => {
                self.stats.hits += 1;
                trace!(hits = self.stats.hits, "warm instance cache hit");
                Some(Arc::clone(instance))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// True if an instance is cached for `key`; does not touch LRU order.
    pub fn contains(&self, key: &CodeHash) -> bool {
        self.entries.peek(key).is_some()
    }

    /// Stores an instance, evicting the least recently used unpinned entry
    /// when over capacity. The entry just inserted is never the victim.
    pub fn insert(&mut self, key: CodeHash, instance: InstanceRef) {
        if let Some(replaced) = self.entries.put(key, instance) {
            if Arc::strong_count(&replaced) == 1 {
                if let Ok(mut guard) = replaced.lock() {
                    guard.clean();
                }
            }
        }

        while self.entries.len() > self.capacity {
            let victim = self
                .entries
                .iter()
                .rev()
                .filter(|(candidate, _)| **candidate != key)
                .find(|(_, entry)| Arc::strong_count(entry) == 1)
                .map(|(victim_key, _)| *victim_key);

            let Some(victim_key) = victim else {
                debug!(
                    len = self.entries.len(),
                    capacity = self.capacity,
                    "all warm instances pinned, cache over capacity"
                );
                break;
            };

            if let Some(evicted) = self.entries.pop(&victim_key) {
                if let Ok(mut guard) = evicted.lock() {
                    guard.clean();
                }
                self.stats.evictions += 1;
            }
        }
    }

    /// Drops every entry, releasing engine resources of instances nobody
    /// else references.
    pub fn clear(&mut self) {
        while let Some((_, instance)) = self.entries.pop_lru() {
            if Arc::strong_count(&instance) == 1 {
                if let Ok(mut guard) = instance.lock() {
                    guard.clean();
                }
            }
        }
        debug!("warm instance cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
