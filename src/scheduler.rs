//! # Eviction scheduler
//! Periodic cache eviction as an explicit task the host spawns and aborts.
//! The cache itself knows nothing about timers, so tests can drive
//! `evict` with synthetic timestamps instead of real delays.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio::task::JoinHandle;

use crate::cache::RepetitionCache;

/// Spawn the periodic eviction task for `cache`.
///
/// The interval normally comes from `DeclutterConfig::eviction_interval()`.
/// When a configuration update changes it (`DeclutterEngine::update_config`
/// returns `true`), abort the returned handle and spawn a fresh task with
/// the recomputed interval. On teardown, clear the engine first, then
/// abort — no dangling periodic callbacks after shutdown.
pub fn spawn_eviction_scheduler(
    cache: Arc<Mutex<RepetitionCache>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick of a tokio interval is harmless here:
        // evicting an empty or fresh cache is a no-op.
        loop {
            ticker.tick().await;
            let remaining = {
                let mut cache = cache.lock().expect("repetition cache mutex poisoned");
                cache.evict(Utc::now());
                cache.len()
            };
            counter!("declutter_eviction_runs_total").increment(1);
            gauge!("declutter_cache_partitions").set(remaining as f64);
            tracing::debug!(
                target: "declutter",
                partitions = remaining,
                "cache eviction cycle"
            );
        }
    })
}
