//! # Tiered Cache
//!
//! A tiered cache engine for lookup data (tenants, roles, users, permissions)
//! that is expensive to fetch and cheap to keep around for a few minutes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CacheManager                         │
//! │  • key = prefix + namespace_ + key                         │
//! │  • namespace policy: default TTL, capacity, persistence    │
//! │  • one operation lock; never returns errors                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Memory Tier (bounded)                   │
//! │  • map + eviction tracker under one lock                   │
//! │  • LRU (default) or FIFO victim selection                  │
//! │  • lazy expiry on read                                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                    (miss: probe in order, promote on hit)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Persistent Tiers (0..n)                    │
//! │  • JSON {value, expiry, ttl} over a key-value surface      │
//! │  • session surface (process lifetime, byte quota)          │
//! │  • file surface (survives restarts)                        │
//! │  • failed write: sweep once, retry once, then drop         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use serde_json::json;
//! use tiered_cache::{CacheConfig, CacheManager};
//!
//! let cache: CacheManager = CacheManager::new(CacheConfig::default().with_rbac_namespaces()).unwrap();
//!
//! cache.set("user:1", json!({"name": "Alice"}), Some(Duration::from_secs(60)), Some("users"));
//! assert_eq!(cache.get("user:1", Some("users")), Some(json!({"name": "Alice"})));
//!
//! // Invalidate every cached user
//! assert_eq!(cache.delete_by_pattern("user:*", Some("users")), 1);
//! assert!(!cache.has("user:1", Some("users")));
//! ```
//!
//! ## Modules
//!
//! - [`manager`]: The [`CacheManager`], its namespace handle and cleanup scheduler
//! - [`storage`]: Memory and persistent tiers, key-value surfaces
//! - [`eviction`]: Recency tracking for victim selection
//! - [`namespace`]: Per-namespace policy resolution
//! - [`key`]: Key composition, wildcard patterns, fingerprints
//! - [`metrics`]: `metrics` facade instrumentation

pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod eviction;
pub mod key;
pub mod manager;
pub mod metrics;
pub mod namespace;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{rbac_namespaces, CacheConfig, NamespaceOverride, TierConfig};
pub use entry::CacheEntry;
pub use error::CacheError;
pub use eviction::{EvictionPolicy, EvictionTracker};
pub use key::{compose_key, fingerprint, KeyPattern};
pub use manager::{
    CacheManager, CacheManagerBuilder, CacheStats, CacheValue, CleanupScheduler, NamespaceCache,
    SchedulerState, WriteReport,
};
pub use metrics::LatencyTimer;
pub use namespace::{NamespaceConfig, NamespaceTable};
pub use storage::{
    BoundedMemoryTier, FileSurface, KeyValueSurface, PersistentTier, SessionSurface, StorageError, Tier,
};
