// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded cache of recently seen message ids.
//!
//! Entries expire after `ttl`; when the cache is full the least recently
//! seen id is evicted. Check-and-set is a single entry insertion, so two
//! concurrent deliveries of the same id can never both pass.

use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::debug;

#[derive(Clone)]
pub struct DedupCache {
    seen: Cache<String, ()>,
    capacity: u64,
    ttl: Duration,
}

impl std::fmt::Debug for DedupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupCache")
            .field("capacity", &self.capacity)
            .field("entry_count", &self.seen.entry_count())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl DedupCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1) as u64;
        let seen = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        debug!(
            capacity,
            ttl_seconds = ttl.as_secs(),
            "message dedup cache created"
        );

        Self {
            seen,
            capacity,
            ttl,
        }
    }

    /// Records `id` and returns true if it was not seen within the TTL.
    pub fn insert_if_absent(&self, id: &str) -> bool {
        self.seen.entry(id.to_owned()).or_insert(()).is_fresh()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains_key(id)
    }

    /// Number of live entries. Applies pending evictions first.
    pub fn len(&self) -> usize {
        self.seen.run_pending_tasks();
        self.seen.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn second_insert_is_rejected() {
        let cache = DedupCache::new(10, Duration::from_secs(60));
        assert!(cache.insert_if_absent("m1"));
        assert!(!cache.insert_if_absent("m1"));
        assert!(cache.insert_if_absent("m2"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = DedupCache::new(10, Duration::from_millis(100));
        assert!(cache.insert_if_absent("m1"));
        assert!(!cache.insert_if_absent("m1"));
        std::thread::sleep(Duration::from_millis(250));
        assert!(!cache.contains("m1"));
        assert!(cache.insert_if_absent("m1"));
    }

    #[test]
    fn full_cache_stays_within_capacity() {
        let cache = DedupCache::new(2, Duration::from_secs(60));
        assert!(cache.insert_if_absent("a"));
        assert!(cache.insert_if_absent("b"));
        assert!(cache.insert_if_absent("c"));
        assert!(cache.len() <= 2);
        assert!(cache.contains("c"));
        assert_eq!(cache.capacity(), 2);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let cache = DedupCache::new(0, Duration::from_secs(60));
        assert_eq!(cache.capacity(), 1);
        assert!(cache.insert_if_absent("only"));
        assert!(!cache.insert_if_absent("only"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicates_pass_once() {
        let cache = Arc::new(DedupCache::new(100, Duration::from_secs(60)));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.insert_if_absent("same") })
            })
            .collect();
        let mut passed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                passed += 1;
            }
        }
        assert_eq!(passed, 1);
    }

    proptest! {
        #[test]
        fn most_recent_id_is_always_suppressed(ids in proptest::collection::vec(0u8..40, 1..200)) {
            let cache = DedupCache::new(8, Duration::from_secs(3600));
            for id in &ids {
                let id = id.to_string();
                cache.insert_if_absent(&id);
                prop_assert!(!cache.insert_if_absent(&id));
            }
        }
    }
}
