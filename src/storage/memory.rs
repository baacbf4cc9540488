use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::traits::{StorageError, Tier};
use crate::entry::CacheEntry;
use crate::eviction::{EvictionPolicy, EvictionTracker};
use crate::key::KeyPattern;

/// Result of a freshness-aware memory lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    Hit(CacheEntry<V>),
    /// Was present but expired; already removed.
    Expired,
    Miss,
}

/// A secondary capacity bound for the keys of one namespace.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub name: &'a str,
    pub capacity: usize,
}

struct Slot<V> {
    entry: CacheEntry<V>,
    scope: Option<Arc<str>>,
}

struct MemoryInner<V> {
    slots: HashMap<String, Slot<V>>,
    tracker: EvictionTracker,
    scope_counts: HashMap<Arc<str>, usize>,
}

impl<V> MemoryInner<V> {
    fn remove(&mut self, key: &str) -> Option<Slot<V>> {
        let slot = self.slots.remove(key)?;
        self.tracker.remove(key);
        if let Some(scope) = &slot.scope {
            if let Some(count) = self.scope_counts.get_mut(scope) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.scope_counts.remove(scope);
                }
            }
        }
        Some(slot)
    }

    fn remove_where<F: FnMut(&str, &CacheEntry<V>) -> bool>(&mut self, mut doomed: F) -> usize {
        let keys: Vec<String> = self
            .slots
            .iter()
            .filter(|(key, slot)| doomed(key, &slot.entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            self.remove(key);
        }
        keys.len()
    }
}

/// Capacity-bounded, volatile tier.
///
/// The entry map and the [`EvictionTracker`] live under one lock and always
/// hold the same key set, so the tracker alone decides which key leaves when
/// an insert overflows.
pub struct BoundedMemoryTier<V> {
    inner: Mutex<MemoryInner<V>>,
    capacity: usize,
    policy: EvictionPolicy,
}

impl<V: Clone> BoundedMemoryTier<V> {
    #[must_use]
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                slots: HashMap::new(),
                tracker: EvictionTracker::new(),
                scope_counts: HashMap::new(),
            }),
            capacity,
            policy,
        }
    }

    /// Fetch `key` if fresh at `now_ms`; expired entries are dropped on the spot.
    pub fn lookup(&self, key: &str, now_ms: u64) -> Lookup<V> {
        let mut inner = self.inner.lock();
        let expired = match inner.slots.get(key) {
            None => return Lookup::Miss,
            Some(slot) => slot.entry.is_expired(now_ms),
        };
        if expired {
            inner.remove(key);
            return Lookup::Expired;
        }
        if self.policy.tracks_reads() {
            inner.tracker.access(key);
        }
        match inner.slots.get(key) {
            Some(slot) => Lookup::Hit(slot.entry.clone()),
            None => Lookup::Miss,
        }
    }

    /// Write `entry` and evict at most one other key if a bound is exceeded.
    ///
    /// With a `scope`, the namespace bound is checked first and its own least
    /// recently used key is the victim; otherwise the global least recently
    /// used key goes. Returns the evicted key.
    pub fn insert(&self, key: &str, entry: CacheEntry<V>, scope: Option<Scope<'_>>) -> Option<String> {
        let mut inner = self.inner.lock();

        // Re-writing a key may move it between scopes.
        inner.remove(key);

        let scope_tag: Option<Arc<str>> = scope.map(|s| Arc::from(s.name));
        if let Some(tag) = &scope_tag {
            *inner.scope_counts.entry(tag.clone()).or_insert(0) += 1;
        }
        inner.slots.insert(
            key.to_string(),
            Slot {
                entry,
                scope: scope_tag.clone(),
            },
        );
        inner.tracker.access(key);

        if let (Some(scope), Some(tag)) = (scope, &scope_tag) {
            let in_scope = inner.scope_counts.get(tag).copied().unwrap_or(0);
            if in_scope > scope.capacity {
                let victim = {
                    let MemoryInner { slots, tracker, .. } = &*inner;
                    tracker
                        .least_recently_used_where(|k| {
                            k != key && slots.get(k).and_then(|s| s.scope.as_ref()) == Some(tag)
                        })
                        .map(str::to_string)
                };
                if let Some(victim) = victim {
                    inner.remove(&victim);
                    return Some(victim);
                }
            }
        }

        if inner.slots.len() > self.capacity {
            // `key` was just moved to the tail, so the head is another key.
            let victim = inner.tracker.least_recently_used().map(str::to_string);
            if let Some(victim) = victim {
                inner.remove(&victim);
                return Some(victim);
            }
        }

        None
    }

    /// Drop `key` from both the map and the recency order.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    /// Empty the tier and reset the recency order.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.slots.clear();
        inner.tracker.clear();
        inner.scope_counts.clear();
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().slots.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().slots.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Keys from next victim to most recently used.
    #[must_use]
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.inner.lock().tracker.iter().map(str::to_string).collect()
    }
}

impl<V: Clone + Send> Tier<V> for BoundedMemoryTier<V> {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry<V>>, StorageError> {
        let mut inner = self.inner.lock();
        if inner.slots.contains_key(key) && self.policy.tracks_reads() {
            inner.tracker.access(key);
        }
        Ok(inner.slots.get(key).map(|slot| slot.entry.clone()))
    }

    fn set(&self, key: &str, entry: &CacheEntry<V>) -> Result<(), StorageError> {
        self.insert(key, entry.clone(), None);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.remove(key))
    }

    fn clear(&self, prefix: &str) -> Result<usize, StorageError> {
        Ok(self.inner.lock().remove_where(|key, _| key.starts_with(prefix)))
    }

    fn delete_by_pattern(&self, pattern: &KeyPattern) -> Result<usize, StorageError> {
        Ok(self.inner.lock().remove_where(|key, _| pattern.matches(key)))
    }

    fn list_keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .inner
            .lock()
            .slots
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn cleanup_expired(&self, prefix: &str, now_ms: u64) -> Result<usize, StorageError> {
        Ok(self
            .inner
            .lock()
            .remove_where(|key, entry| key.starts_with(prefix) && entry.is_expired(now_ms)))
    }

    fn count_by_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        Ok(self
            .inner
            .lock()
            .slots
            .keys()
            .filter(|key| key.starts_with(prefix))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(v: &str) -> CacheEntry<String> {
        CacheEntry::new(v.to_string(), 0, 1_000)
    }

    fn tier(capacity: usize) -> BoundedMemoryTier<String> {
        BoundedMemoryTier::new(capacity, EvictionPolicy::Lru)
    }

    #[test]
    fn test_new_tier_is_empty() {
        let tier = tier(3);
        assert!(tier.is_empty());
        assert_eq!(tier.capacity(), 3);
        assert_eq!(tier.lookup("x", 0), Lookup::Miss);
    }

    #[test]
    fn test_insert_and_lookup() {
        let tier = tier(3);
        assert_eq!(tier.insert("a", entry("1"), None), None);

        assert_eq!(tier.lookup("a", 10), Lookup::Hit(entry("1")));
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_lookup_drops_expired() {
        let tier = tier(3);
        tier.insert("a", entry("1"), None);

        assert_eq!(tier.lookup("a", 1_000), Lookup::Expired);
        assert!(!tier.contains("a"));
        assert!(tier.keys_by_recency().is_empty());
    }

    #[test]
    fn test_overflow_evicts_exactly_one_lru() {
        let tier = tier(3);
        for key in ["k0", "k1", "k2"] {
            tier.insert(key, entry(key), None);
        }
        // Reading k0 makes k1 the least recently used.
        tier.lookup("k0", 1);

        let evicted = tier.insert("k3", entry("k3"), None);
        assert_eq!(evicted.as_deref(), Some("k1"));
        assert_eq!(tier.len(), 3);
        assert_eq!(tier.keys_by_recency(), vec!["k2", "k0", "k3"]);
    }

    #[test]
    fn test_fifo_ignores_reads() {
        let tier = BoundedMemoryTier::new(2, EvictionPolicy::Fifo);
        tier.insert("a", entry("a"), None);
        tier.insert("b", entry("b"), None);
        tier.lookup("a", 1);

        let evicted = tier.insert("c", entry("c"), None);
        assert_eq!(evicted.as_deref(), Some("a"));
    }

    #[test]
    fn test_rewrite_does_not_grow_or_evict() {
        let tier = tier(2);
        tier.insert("a", entry("1"), None);
        tier.insert("b", entry("1"), None);

        assert_eq!(tier.insert("a", entry("2"), None), None);
        assert_eq!(tier.len(), 2);
        assert_eq!(tier.lookup("a", 0), Lookup::Hit(entry("2")));
    }

    #[test]
    fn test_scope_capacity_evicts_within_scope() {
        let tier = tier(10);
        let scope = Scope { name: "small", capacity: 2 };
        tier.insert("other", entry("o"), None);
        tier.insert("s1", entry("1"), Some(scope));
        tier.insert("s2", entry("2"), Some(scope));

        let evicted = tier.insert("s3", entry("3"), Some(scope));
        assert_eq!(evicted.as_deref(), Some("s1"));
        assert!(tier.contains("other"));
        assert_eq!(tier.len(), 3);
    }

    #[test]
    fn test_scope_count_follows_removals() {
        let tier = tier(10);
        let scope = Scope { name: "small", capacity: 1 };
        tier.insert("s1", entry("1"), Some(scope));
        tier.remove("s1");

        assert_eq!(tier.insert("s2", entry("2"), Some(scope)), None);
    }

    #[test]
    fn test_pattern_and_prefix_operations() {
        let tier = tier(10);
        for key in ["p_user_1", "p_user_2", "p_role_1", "q_user_1"] {
            tier.insert(key, entry(key), None);
        }

        let mut keys = tier.list_keys_by_prefix("p_").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["p_role_1", "p_user_1", "p_user_2"]);

        let removed = tier.delete_by_pattern(&KeyPattern::compile("p_user_*")).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(tier.count_by_prefix("p_").unwrap(), 1);

        assert_eq!(tier.clear("p_").unwrap(), 1);
        assert_eq!(tier.len(), 1);
        assert_eq!(tier.keys_by_recency(), vec!["q_user_1"]);
    }

    #[test]
    fn test_cleanup_expired_keeps_fresh() {
        let tier = tier(10);
        tier.insert("p_old", CacheEntry::new("o".to_string(), 0, 10), None);
        tier.insert("p_new", CacheEntry::new("n".to_string(), 0, 100), None);

        assert_eq!(tier.cleanup_expired("p_", 50).unwrap(), 1);
        assert!(tier.contains("p_new"));
        assert!(!tier.contains("p_old"));
    }

    #[test]
    fn test_reset() {
        let tier = tier(2);
        tier.insert("a", entry("a"), None);
        tier.reset();
        assert!(tier.is_empty());
        assert!(tier.keys_by_recency().is_empty());
    }

    #[test]
    fn test_trait_get_does_not_check_expiry() {
        let tier = tier(2);
        tier.insert("a", CacheEntry::new("a".to_string(), 0, 1), None);
        let raw = Tier::get(&tier, "a").unwrap();
        assert!(raw.is_some());
    }
}
