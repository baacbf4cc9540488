//! Public types returned by the cache manager.

use std::collections::BTreeMap;

use serde::Serialize;

/// Outcome of a [`set`](super::CacheManager::set).
///
/// Writes never fail as far as the caller is concerned; this report says how
/// far the value got. Ignoring it gives plain best-effort caching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Stored in the memory tier (false only when caching is disabled)
    pub cached: bool,
    /// Persistent tiers that accepted the write, in probe order
    pub persisted: Vec<String>,
    /// Persistent tiers that rejected the write and its retry
    pub failed: Vec<String>,
}

impl WriteReport {
    /// True when no tier that should have taken the write dropped it.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cached && self.failed.is_empty()
    }

    /// True when the value survives losing the memory tier.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        !self.persisted.is_empty()
    }
}

/// State of the periodic expired-entry sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Stopped,
    Running,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Running => write!(f, "Running"),
        }
    }
}

/// Snapshot of cache contents and counters.
///
/// Counts cover keys under the manager's prefix only. Values are never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    /// Global key prefix
    pub prefix: String,
    /// Entry count per tier name (`memory` plus every persistent tier)
    pub tiers: BTreeMap<String, usize>,
    pub hits: u64,
    pub misses: u64,
    /// Persistent hits copied back into memory
    pub promotions: u64,
    /// Capacity evictions from the memory tier
    pub evictions: u64,
    /// Persistent writes dropped after their retry failed
    pub write_failures: u64,
    pub scheduler: SchedulerState,
}

impl CacheStats {
    /// Entries in the memory tier.
    #[must_use]
    pub fn memory_entries(&self) -> usize {
        self.tiers.get("memory").copied().unwrap_or(0)
    }

    /// Entries across every tier (a key held by two tiers counts twice).
    #[must_use]
    pub fn total_entries(&self) -> usize {
        self.tiers.values().sum()
    }

    /// Hit ratio over all lookups, 0.0 when nothing was looked up.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}
