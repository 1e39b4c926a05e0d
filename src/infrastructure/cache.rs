use std::time::Duration;

use moka::sync::Cache;

use crate::domain::mapping::MappingKey;
use crate::domain::ports::MappingCache;
use crate::domain::value_objects::{EntityKind, ShopId};

/// Default lifetime of a cached mapping lookup.
pub const DEFAULT_MAPPING_TTL: Duration = Duration::from_secs(15 * 60);

/// Upper bound on cached lookups; least recently used keys are evicted first.
const MAX_CACHED_MAPPINGS: u64 = 100_000;

/// Process-wide in-memory implementation of [`MappingCache`].
///
/// Entries expire `ttl` after they were stored and the cache never holds more
/// than [`MAX_CACHED_MAPPINGS`] keys. Shared between services through `Arc`.
pub struct InMemoryMappingCache {
    ttl: Duration,
    entries: Cache<MappingKey, Option<i64>>,
}

impl InMemoryMappingCache {
    pub fn new(ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(MAX_CACHED_MAPPINGS)
            .time_to_live(ttl)
            .build();
        Self { ttl, entries }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of live entries, after pending expirations are applied.
    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryMappingCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAPPING_TTL)
    }
}

impl MappingCache for InMemoryMappingCache {
    fn get(&self, key: &MappingKey) -> Option<Option<i64>> {
        self.entries.get(key)
    }

    fn put(&self, key: MappingKey, remote_id: Option<i64>) {
        self.entries.insert(key, remote_id);
    }

    fn invalidate(&self, key: &MappingKey) {
        self.entries.invalidate(key);
    }

    fn invalidate_scope(&self, shop: ShopId, kind: EntityKind) {
        let stale: Vec<_> = self
            .entries
            .iter()
            .filter(|(k, _)| k.shop_id == shop && k.entity_kind == kind)
            .map(|(k, _)| k)
            .collect();
        for key in stale {
            self.entries.invalidate(key.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(local: &str) -> MappingKey {
        MappingKey::new(ShopId(1), EntityKind::Category, local)
    }

    #[test]
    fn miss_then_hit() {
        let cache = InMemoryMappingCache::default();
        assert_eq!(cache.get(&key("5")), None);
        cache.put(key("5"), Some(42));
        assert_eq!(cache.get(&key("5")), Some(Some(42)));
    }

    #[test]
    fn negative_results_are_cached() {
        let cache = InMemoryMappingCache::default();
        cache.put(key("7"), None);
        assert_eq!(cache.get(&key("7")), Some(None));
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = InMemoryMappingCache::new(Duration::from_millis(1));
        cache.put(key("5"), Some(42));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&key("5")), None);
    }

    #[test]
    fn expired_entries_are_reclaimed_without_being_read() {
        let cache = InMemoryMappingCache::new(Duration::from_millis(1));
        for id in 0..200 {
            cache.put(key(&id.to_string()), Some(id));
        }
        std::thread::sleep(Duration::from_millis(20));
        cache.put(key("fresh"), Some(1));
        std::thread::sleep(Duration::from_millis(20));

        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_removes_single_key() {
        let cache = InMemoryMappingCache::default();
        cache.put(key("5"), Some(42));
        cache.put(key("6"), Some(43));
        cache.invalidate(&key("5"));
        assert_eq!(cache.get(&key("5")), None);
        assert_eq!(cache.get(&key("6")), Some(Some(43)));
    }

    #[test]
    fn invalidate_scope_keeps_other_kinds_and_shops() {
        let cache = InMemoryMappingCache::default();
        cache.put(key("5"), Some(42));
        cache.put(MappingKey::new(ShopId(2), EntityKind::Category, "5"), Some(1));
        cache.put(MappingKey::new(ShopId(1), EntityKind::Warehouse, "5"), Some(2));

        cache.invalidate_scope(ShopId(1), EntityKind::Category);

        assert_eq!(cache.get(&key("5")), None);
        assert_eq!(cache.len(), 2);
    }
}
