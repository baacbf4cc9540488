//! Property-based tests (fuzzing) for cache invariants.
//!
//! Uses proptest to drive the manager with random operation sequences and
//! malformed persisted data, and checks the invariants that must hold no
//! matter what: bounded memory, TTL boundaries, anchored patterns, and no
//! panics on garbage.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use serde_json::{json, Value};

use tiered_cache::{
    CacheConfig, CacheManager, EvictionPolicy, KeyPattern, KeyValueSurface, ManualClock,
    NamespaceOverride, SessionSurface,
};

// =============================================================================
// Strategies for generating test data
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Set { key: String, ns: Option<String>, ttl_ms: u64 },
    Get { key: String, ns: Option<String> },
    Delete { key: String, ns: Option<String> },
    Advance(u64),
    Sweep,
}

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-d]{1,2}"
}

fn ns_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), Just(Some("small".to_string())), Just(Some("big".to_string()))]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (key_strategy(), ns_strategy(), 1u64..5_000)
            .prop_map(|(key, ns, ttl_ms)| Op::Set { key, ns, ttl_ms }),
        3 => (key_strategy(), ns_strategy()).prop_map(|(key, ns)| Op::Get { key, ns }),
        1 => (key_strategy(), ns_strategy()).prop_map(|(key, ns)| Op::Delete { key, ns }),
        1 => (0u64..3_000).prop_map(Op::Advance),
        1 => Just(Op::Sweep),
    ]
}

/// Generate arbitrary JSON values
fn arbitrary_json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(
        4,   // depth
        64,  // max nodes
        10,  // items per collection
        |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..10).prop_map(Value::Array),
                prop::collection::hash_map(".*", inner, 0..10)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        },
    )
}

fn cache_with_session(
    max_entries: usize,
    policy: EvictionPolicy,
) -> (CacheManager, Arc<ManualClock>, Arc<SessionSurface>) {
    let clock = Arc::new(ManualClock::new(0));
    let surface = Arc::new(SessionSurface::new());
    let config = CacheConfig {
        max_memory_entries: max_entries,
        eviction_policy: policy,
        ..CacheConfig::memory_only()
    }
    .with_namespace("small", NamespaceOverride::new(10_000, 2));
    let cache: CacheManager = CacheManager::builder(config)
        .clock(clock.clone())
        .surface("session", surface.clone())
        .build()
        .unwrap();
    (cache, clock, surface)
}

// =============================================================================
// Capacity
// =============================================================================

proptest! {
    /// Memory never holds more than max_memory_entries, whatever the workload
    #[test]
    fn prop_memory_bound_holds(
        capacity in 1usize..6,
        lru in any::<bool>(),
        ops in prop::collection::vec(op_strategy(), 0..80),
    ) {
        let policy = if lru { EvictionPolicy::Lru } else { EvictionPolicy::Fifo };
        let (cache, clock, _) = cache_with_session(capacity, policy);

        for op in ops {
            match op {
                Op::Set { key, ns, ttl_ms } => {
                    cache.set(&key, json!(ttl_ms), Some(Duration::from_millis(ttl_ms)), ns.as_deref());
                }
                Op::Get { key, ns } => { cache.get(&key, ns.as_deref()); }
                Op::Delete { key, ns } => { cache.delete(&key, ns.as_deref()); }
                Op::Advance(ms) => clock.advance(Duration::from_millis(ms)),
                Op::Sweep => { cache.cleanup_expired(); }
            }
            prop_assert!(cache.stats().memory_entries() <= capacity);
        }
    }

    /// Exactly one key leaves memory per overflowing set
    #[test]
    fn prop_one_eviction_per_overflow(capacity in 1usize..8, extra in 1usize..8) {
        let clock = Arc::new(ManualClock::new(0));
        let config = CacheConfig { max_memory_entries: capacity, ..CacheConfig::memory_only() };
        let cache: CacheManager = CacheManager::builder(config).clock(clock).build().unwrap();

        for i in 0..capacity + extra {
            cache.set(&format!("k{i}"), json!(i), None, None);
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.memory_entries(), capacity);
        prop_assert_eq!(stats.evictions, extra as u64);
    }
}

// =============================================================================
// TTL
// =============================================================================

proptest! {
    /// Fresh strictly before write + ttl, gone from then on
    #[test]
    fn prop_ttl_boundary(ttl_ms in 1u64..100_000, before in 0u64..100_000, after in 0u64..100_000) {
        let (cache, clock, _) = cache_with_session(10, EvictionPolicy::Lru);
        cache.set("k", json!("v"), Some(Duration::from_millis(ttl_ms)), None);

        clock.set(before % ttl_ms);
        prop_assert_eq!(cache.get("k", None), Some(json!("v")));

        clock.set(ttl_ms + after);
        prop_assert_eq!(cache.get("k", None), None);
    }

    /// Any JSON value comes back unchanged, from memory or after promotion
    #[test]
    fn prop_values_survive_promotion(value in arbitrary_json_strategy()) {
        let (cache, _, _) = cache_with_session(10, EvictionPolicy::Lru);
        cache.set("k", value.clone(), None, None);
        prop_assert_eq!(cache.get("k", None), Some(value.clone()));

        // Evict by flooding memory, then read back through the session tier.
        for i in 0..10 {
            cache.set(&format!("flood{i}"), json!(i), None, None);
        }
        prop_assert_eq!(cache.get("k", None), Some(value));
    }
}

// =============================================================================
// Patterns
// =============================================================================

proptest! {
    /// A pattern without wildcards only ever matches itself
    #[test]
    fn prop_exact_pattern_matches_only_itself(a in "[a-z:_.]{0,12}", b in "[a-z:_.]{0,12}") {
        let pattern = KeyPattern::compile(&a);
        prop_assert!(pattern.matches(&a));
        prop_assert_eq!(pattern.matches(&b), a == b);
    }

    /// prefix + "*" matches exactly the keys starting with prefix
    #[test]
    fn prop_trailing_wildcard_is_prefix_match(prefix in "[a-z:]{0,6}", key in "[a-z:]{0,10}") {
        let pattern = KeyPattern::compile(&format!("{prefix}*"));
        prop_assert_eq!(pattern.matches(&key), key.starts_with(&prefix));
    }

    /// Regex metacharacters are literal
    #[test]
    fn prop_metacharacters_are_literal(key in "[.+?()\\[\\]{}|^$a-z]{1,10}") {
        let pattern = KeyPattern::compile(&key);
        prop_assert!(pattern.matches(&key));
        let longer = format!("{key}x");
        prop_assert!(!pattern.matches(&longer));
    }

    /// Pattern deletion never touches keys outside the namespace
    #[test]
    fn prop_pattern_delete_stays_in_namespace(keys in prop::collection::btree_set("[a-c]{1,3}", 1..8)) {
        let (cache, _, _) = cache_with_session(50, EvictionPolicy::Lru);
        for key in &keys {
            cache.set(key, json!(1), None, Some("ns"));
            cache.set(key, json!(2), None, Some("other"));
        }

        let removed = cache.delete_by_pattern("*", Some("ns"));
        prop_assert_eq!(removed, keys.len());
        prop_assert_eq!(cache.keys_by_namespace(Some("other")).len(), keys.len());
    }
}

// =============================================================================
// Corrupt persisted data
// =============================================================================

proptest! {
    /// Garbage under a cache key is a miss, never a panic, and the sweep removes it
    #[test]
    fn fuzz_corrupt_entry_is_miss(raw in ".*") {
        let (cache, _, surface) = cache_with_session(10, EvictionPolicy::Lru);
        surface.set_item("cache_k", raw.clone()).unwrap();

        // A well-formed entry with a future expiry is legitimately a hit.
        let parsed = serde_json::from_str::<tiered_cache::CacheEntry<Value>>(&raw).ok();
        let expected = parsed.filter(|e| !e.is_expired(0)).map(|e| e.value);
        prop_assert_eq!(cache.get("k", None), expected);

        cache.cleanup_expired();
        let _ = cache.stats();
    }

    /// Arbitrary JSON documents never break reads
    #[test]
    fn fuzz_arbitrary_json_entry(doc in arbitrary_json_strategy()) {
        let (cache, _, surface) = cache_with_session(10, EvictionPolicy::Lru);
        surface.set_item("cache_k", doc.to_string()).unwrap();
        let _ = cache.get("k", None);
        let _ = cache.cleanup_expired();
    }
}
