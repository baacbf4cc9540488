// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

/// Which accesses move a key to the most-recent end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Writes and reads refresh recency.
    #[default]
    Lru,
    /// Only writes refresh recency (oldest write is evicted first).
    Fifo,
}

impl EvictionPolicy {
    /// Whether a read hit should count as an access.
    #[inline]
    #[must_use]
    pub fn tracks_reads(&self) -> bool {
        matches!(self, Self::Lru)
    }
}

impl std::fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lru => write!(f, "lru"),
            Self::Fifo => write!(f, "fifo"),
        }
    }
}

/// Recency order over keys.
///
/// Every access stamps the key with a fresh, strictly increasing sequence
/// number. `order` maps stamp → key so the head (smallest stamp) is the least
/// recently used key; `stamps` maps key → its current stamp so a re-access can
/// drop the stale position. Both maps always hold the same key set.
#[derive(Debug, Default)]
pub struct EvictionTracker {
    stamps: HashMap<String, u64>,
    order: BTreeMap<u64, String>,
    next_stamp: u64,
}

impl EvictionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `key` to the most-recent end, appending it if absent.
    pub fn access(&mut self, key: &str) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;

        match self.stamps.get_mut(key) {
            Some(current) => {
                let key = self.order.remove(current).unwrap_or_else(|| key.to_string());
                *current = stamp;
                self.order.insert(stamp, key);
            }
            None => {
                self.stamps.insert(key.to_string(), stamp);
                self.order.insert(stamp, key.to_string());
            }
        }
    }

    /// Head of the order.
    #[must_use]
    pub fn least_recently_used(&self) -> Option<&str> {
        self.order.values().next().map(String::as_str)
    }

    /// Least recently used key satisfying `accept`.
    pub fn least_recently_used_where<F>(&self, mut accept: F) -> Option<&str>
    where
        F: FnMut(&str) -> bool,
    {
        self.order.values().map(String::as_str).find(|key| accept(key))
    }

    /// Forget `key`. Returns whether it was tracked.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.stamps.remove(key) {
            Some(stamp) => {
                self.order.remove(&stamp);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.stamps.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// Keys from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.values().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
        self.order.clear();
        self.next_stamp = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(tracker: &EvictionTracker) -> Vec<&str> {
        tracker.iter().collect()
    }

    #[test]
    fn test_empty_tracker_has_no_victim() {
        let tracker = EvictionTracker::new();
        assert!(tracker.least_recently_used().is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_access_appends_in_order() {
        let mut tracker = EvictionTracker::new();
        tracker.access("a");
        tracker.access("b");
        tracker.access("c");

        assert_eq!(order(&tracker), vec!["a", "b", "c"]);
        assert_eq!(tracker.least_recently_used(), Some("a"));
    }

    #[test]
    fn test_reaccess_moves_to_tail() {
        let mut tracker = EvictionTracker::new();
        tracker.access("a");
        tracker.access("b");
        tracker.access("a");

        assert_eq!(order(&tracker), vec!["b", "a"]);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut tracker = EvictionTracker::new();
        tracker.access("a");
        tracker.access("b");

        assert!(tracker.remove("a"));
        assert!(!tracker.remove("a"));
        assert_eq!(tracker.least_recently_used(), Some("b"));
        assert!(!tracker.contains("a"));
    }

    #[test]
    fn test_filtered_victim() {
        let mut tracker = EvictionTracker::new();
        tracker.access("ns1_a");
        tracker.access("ns2_b");
        tracker.access("ns2_c");

        let victim = tracker.least_recently_used_where(|k| k.starts_with("ns2_"));
        assert_eq!(victim, Some("ns2_b"));
        assert_eq!(tracker.least_recently_used_where(|k| k.starts_with("ns3_")), None);
    }

    #[test]
    fn test_clear_resets() {
        let mut tracker = EvictionTracker::new();
        tracker.access("a");
        tracker.clear();
        assert!(tracker.is_empty());
        tracker.access("b");
        assert_eq!(order(&tracker), vec!["b"]);
    }

    #[test]
    fn test_policy_read_tracking() {
        assert!(EvictionPolicy::Lru.tracks_reads());
        assert!(!EvictionPolicy::Fifo.tracks_reads());
        assert_eq!(EvictionPolicy::default(), EvictionPolicy::Lru);
        assert_eq!(EvictionPolicy::Fifo.to_string(), "fifo");
    }
}
