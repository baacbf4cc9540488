//! Eviction for the bounded memory tier.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Eviction Module                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  tracker.rs   - Recency order                                │
//! │  └─ EvictionTracker: access / least_recently_used / remove   │
//! │  └─ EvictionPolicy: lru (reads count) or fifo (writes only)  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The tracker is the single source of victim choice. The memory tier keeps
//! it under the same lock as its map, so an overflow produces exactly one
//! eviction decision.

pub mod tracker;

pub use tracker::{EvictionPolicy, EvictionTracker};
