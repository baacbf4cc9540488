// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic tiered-cache usage example.
//!
//! Demonstrates:
//! 1. Building a manager with a session tier and a file tier
//! 2. Caching RBAC lookups per namespace
//! 3. Read-through fetching
//! 4. Promotion after a simulated restart
//! 5. Pattern invalidation
//! 6. The periodic cleanup sweep
//! 7. Displaying stats and metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::{json, Value};
use tiered_cache::{fingerprint, CacheConfig, CacheManager, TierConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder (captures all metrics for display)
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           tiered-cache: Basic Usage Example                   ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure the manager
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Configuring tiered-cache...");

    let cache_file = std::env::temp_dir().join("tiered-cache-demo").join("local.json");
    let config = CacheConfig {
        prefix: "console_".into(),
        max_memory_entries: 4,
        cleanup_interval_ms: 1_000,
        persistent_tiers: vec![
            TierConfig::Session { quota_bytes: Some(64 * 1024) },
            TierConfig::File { path: cache_file.clone(), quota_bytes: Some(1024 * 1024) },
        ],
        ..Default::default()
    }
    .with_rbac_namespaces();

    let cache: Arc<CacheManager> = Arc::new(CacheManager::new(config.clone())?);
    cache.clear();
    cache.start_cleanup()?;
    println!("   Tiers: memory → {}", cache.tier_names().join(" → "));
    println!("   File tier: {}", cache_file.display());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Cache some RBAC lookups
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Caching RBAC lookups...");

    let entries = [
        ("tenants", "t-1", json!({"name": "Acme", "plan": "enterprise"})),
        ("roles", "admin", json!({"permissions": ["*"]})),
        ("roles", "viewer", json!({"permissions": ["camera:read"]})),
        ("users", "alice", json!({"tenant": "t-1", "roles": ["admin"]})),
        ("users", "bob", json!({"tenant": "t-1", "roles": ["viewer"]})),
    ];
    for (namespace, key, value) in &entries {
        let report = cache.set(key, value.clone(), None, Some(*namespace));
        println!(
            "   └─ {namespace}/{key} → persisted to {:?}, failed {:?}",
            report.persisted, report.failed
        );
    }
    println!("   Memory holds {} of {} entries (capacity 4)", cache.stats().memory_entries(), entries.len());

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Read-through
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔁 Read-through with get_or_fetch...");

    let query = fingerprint("cameras", &json!({"site": "hq", "page": 1}));
    for attempt in 1..=2 {
        let start = Instant::now();
        let cameras = cache
            .get_or_fetch(&query, Some("queries"), Some(Duration::from_secs(30)), || async {
                // Stand-in for a network call
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<Value, std::io::Error>(json!([{"id": "cam-1"}, {"id": "cam-2"}]))
            })
            .await?;
        println!("   └─ attempt {attempt}: {} cameras in {:?}", cameras.as_array().map_or(0, Vec::len), start.elapsed());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Restart: memory is gone, the file tier is not
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n♻️  Simulating a restart...");

    let restarted: CacheManager = CacheManager::new(config)?;
    println!("   Memory entries after restart: {}", restarted.stats().memory_entries());
    let alice = restarted.get("alice", Some("users"));
    println!("   └─ users/alice → {}", alice.map_or("miss".to_string(), |v| v.to_string()));
    println!("   Memory entries after promotion: {}", restarted.stats().memory_entries());

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Invalidate by pattern
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🧹 Invalidating every cached query of 'cameras'...");
    let removed = cache.delete_by_pattern("cameras_*", Some("queries"));
    println!("   └─ removed {removed} key(s); roles namespace still has {:?}", cache.namespace("roles").keys());

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Periodic sweep
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n⏳ Writing a short-lived entry and waiting for the sweep...");
    cache.set("otp", json!("123456"), Some(Duration::from_millis(200)), Some("auth"));
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    println!("   └─ auth keys after sweep: {:?}", cache.keys_by_namespace(Some("auth")));

    // ─────────────────────────────────────────────────────────────────────────
    // 7. Stats and metrics
    // ─────────────────────────────────────────────────────────────────────────
    let stats = cache.stats();
    println!("\n📊 Cache Stats:");
    println!("   ┌─ Prefix: {}", stats.prefix);
    for (tier, count) in &stats.tiers {
        println!("   │  └─ {tier}: {count} entries");
    }
    println!("   ├─ Hits: {}  Misses: {}  Hit ratio: {:.0}%", stats.hits, stats.misses, stats.hit_ratio() * 100.0);
    println!("   ├─ Promotions: {}  Evictions: {}", stats.promotions, stats.evictions);
    println!("   └─ Dropped writes: {}  Scheduler: {}", stats.write_failures, stats.scheduler);

    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    cache.stop_cleanup();
    cache.clear();
    println!("\n✅ Done.");
    Ok(())
}

/// Dump all captured metrics
fn dump_metrics(snapshotter: &Snapshotter) {
    let snapshot = snapshotter.snapshot();

    let mut counters: Vec<_> = vec![];
    let mut gauges: Vec<_> = vec![];
    let mut histograms: Vec<_> = vec![];

    for (composite_key, _, _, value) in snapshot.into_vec() {
        let (_, key) = composite_key.into_parts();
        let name = key.name().to_string();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        match value {
            DebugValue::Counter(v) => counters.push((name, label_str, v)),
            DebugValue::Gauge(v) => gauges.push((name, label_str, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                histograms.push((name, label_str, count, sum));
            }
        }
    }

    counters.sort();
    gauges.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    histograms.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    if !counters.is_empty() {
        println!("   ┌─ Counters (cumulative)");
        for (name, labels, value) in &counters {
            println!("   │  └─ {}{} = {}", name, labels, value);
        }
    }

    if !gauges.is_empty() {
        println!("   ├─ Gauges (current value)");
        for (name, labels, value) in &gauges {
            println!("   │  └─ {}{} = {:.2}", name, labels, value);
        }
    }

    if !histograms.is_empty() {
        println!("   └─ Histograms (distributions)");
        for (name, labels, count, sum) in &histograms {
            let avg = if *count > 0 { sum / *count as f64 } else { 0.0 };
            println!("   │  └─ {}{} count={} avg={:.6}s", name, labels, count, avg);
        }
    }

    if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
}
