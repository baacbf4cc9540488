//! The unit stored in every tier.
//!
//! A [`CacheEntry`] carries its own absolute expiry so any tier can decide
//! freshness without consulting the manager. Entries are never mutated: a
//! `set` on an existing key writes a new entry.
//!
//! # Persisted form
//!
//! ```json
//! {"value": {"name": "Alice"}, "expiry": 1767084657058, "ttl": 600000}
//! ```

use serde::{Deserialize, Serialize};

/// A cached value with its expiry (epoch ms) and the TTL it was written with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expiry: u64,
    pub ttl: u64,
}

impl<V> CacheEntry<V> {
    /// Build an entry written at `now_ms` that lives for `ttl_ms`.
    #[must_use]
    pub fn new(value: V, now_ms: u64, ttl_ms: u64) -> Self {
        Self {
            value,
            expiry: now_ms.saturating_add(ttl_ms),
            ttl: ttl_ms,
        }
    }

    /// Fresh while `now < expiry`.
    #[inline]
    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expiry
    }

    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expiry_is_write_time_plus_ttl() {
        let entry = CacheEntry::new("v", 1_000, 500);
        assert_eq!(entry.expiry, 1_500);
        assert_eq!(entry.ttl, 500);
    }

    #[test]
    fn test_expired_at_boundary() {
        let entry = CacheEntry::new(1u8, 0, 100);
        assert!(!entry.is_expired(99));
        assert!(entry.is_expired(100));
        assert!(entry.is_expired(101));
    }

    #[test]
    fn test_expiry_saturates_on_huge_ttl() {
        let entry = CacheEntry::new((), u64::MAX - 1, 10);
        assert_eq!(entry.expiry, u64::MAX);
    }

    #[test]
    fn test_persisted_shape() {
        let entry = CacheEntry::new(json!({"name": "Alice"}), 10, 20);
        let encoded = serde_json::to_value(&entry).unwrap();
        assert_eq!(encoded, json!({"value": {"name": "Alice"}, "expiry": 30, "ttl": 20}));
    }

    #[test]
    fn test_null_value_roundtrips_as_present() {
        let raw = r#"{"value":null,"expiry":5,"ttl":5}"#;
        let entry: CacheEntry<serde_json::Value> = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.value, serde_json::Value::Null);
    }
}
