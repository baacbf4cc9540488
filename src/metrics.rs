// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the cache.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `tiered_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `tier`: memory, session, local, ... (or `all`)
//! - `operation`: get, set, delete, delete_pattern, clear, cleanup
//! - `status`: hit, miss, expired, success, error, retried

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a cache operation outcome
pub fn record_operation(tier: &str, operation: &str, status: &str) {
    counter!(
        "tiered_cache_operations_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(tier: &str, operation: &str, duration: Duration) {
    histogram!(
        "tiered_cache_operation_seconds",
        "tier" => tier.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a capacity eviction from the memory tier
pub fn record_eviction(reason: &str) {
    counter!(
        "tiered_cache_evictions_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a persistent-tier hit copied back into memory
pub fn record_promotion(from_tier: &str) {
    counter!(
        "tiered_cache_promotions_total",
        "tier" => from_tier.to_string()
    )
    .increment(1);
}

/// Record entries removed by a sweep
pub fn record_expired_removed(tier: &str, count: usize) {
    counter!(
        "tiered_cache_expired_removed_total",
        "tier" => tier.to_string()
    )
    .increment(count as u64);
}

/// Record entries removed by a pattern invalidation
pub fn record_pattern_removed(tier: &str, count: usize) {
    counter!(
        "tiered_cache_pattern_removed_total",
        "tier" => tier.to_string()
    )
    .increment(count as u64);
}

/// Set current memory tier entry count
pub fn set_memory_entries(count: usize) {
    gauge!("tiered_cache_memory_entries").set(count as f64);
}

/// Set entry count of a persistent tier
pub fn set_tier_entries(tier: &str, count: usize) {
    gauge!(
        "tiered_cache_tier_entries",
        "tier" => tier.to_string()
    )
    .set(count as f64);
}

/// Set whether the cleanup scheduler is running (1 = running, 0 = stopped)
pub fn set_scheduler_running(running: bool) {
    gauge!("tiered_cache_scheduler_running").set(if running { 1.0 } else { 0.0 });
}

// ═══════════════════════════════════════════════════════════════════════════
// ERROR TRACKING - Categorized error counters for alerting
// ═══════════════════════════════════════════════════════════════════════════

/// Record an error with category for alerting
pub fn record_error(tier: &str, operation: &str, error_type: &str) {
    counter!(
        "tiered_cache_errors_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record a write that was dropped after its retry also failed
pub fn record_dropped_write(tier: &str) {
    counter!(
        "tiered_cache_dropped_writes_total",
        "tier" => tier.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// SWEEP - Periodic cleanup timing
// ═══════════════════════════════════════════════════════════════════════════

/// Record sweep duration
pub fn record_sweep_duration(duration: Duration) {
    histogram!("tiered_cache_sweep_seconds").record(duration.as_secs_f64());
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    tier: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(tier: &'static str, operation: &'static str) -> Self {
        Self {
            tier,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.tier, self.operation, self.start.elapsed());
    }
}

/// Convenience macro for timing operations
#[macro_export]
macro_rules! time_operation {
    ($tier:expr, $op:expr) => {
        $crate::metrics::LatencyTimer::new($tier, $op)
    };
}
