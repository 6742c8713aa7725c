//! # Repetition cache
//! Time-bounded store of recently seen messages, partitioned by an opaque
//! key (one shared partition in global mode, one per author otherwise).
//!
//! The cache knows nothing about timers: `record_and_score` and `evict`
//! take an explicit `now`, so tests drive it with synthetic timestamps and
//! the host schedules eviction however it likes (see `scheduler`).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::similarity::similarity;

#[derive(Debug, Clone)]
struct CachedMessage {
    text: String,
    expires_at: DateTime<Utc>,
}

/// Recent-message history for one key. Insertion-ordered, unbounded until
/// eviction; carries its own expiration independent of its records.
#[derive(Debug)]
struct Partition {
    messages: Vec<CachedMessage>,
    expires_at: DateTime<Utc>,
}

/// Self-evicting cache of recent messages.
///
/// Invariant: a partition present in the map holds at least one record.
/// Emptied partitions are removed synchronously, never left dangling.
#[derive(Debug)]
pub struct RepetitionCache {
    partitions: HashMap<String, Partition>,
    ttl: Duration,
}

impl RepetitionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            partitions: HashMap::new(),
            ttl,
        }
    }

    /// Update the TTL at runtime. Affects only future expirations; already
    /// stamped records keep their deadlines.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Score `text` against the history stored under `key`, then remember it.
    ///
    /// Returns how many still-live records in the partition are similar to
    /// `text` — strictly above `similarity_threshold` (a fraction in
    /// `[0.0, 1.0]`). A first-ever message for a key returns 0. The new
    /// record is appended after scoring, so a message never matches itself.
    ///
    /// Every call stamps the partition's expiration to `now + ttl`: an
    /// active conversation keeps its partition alive even while individual
    /// records inside it age out.
    pub fn record_and_score(
        &mut self,
        key: &str,
        text: &str,
        similarity_threshold: f64,
        now: DateTime<Utc>,
    ) -> u32 {
        let expires_at = now + self.ttl;
        let record = CachedMessage {
            text: text.to_string(),
            expires_at,
        };

        match self.partitions.get_mut(key) {
            Some(partition) => {
                partition.expires_at = expires_at;
                let mut n: u32 = 0;
                for msg in &partition.messages {
                    // Individually expired records are dead even before the
                    // next eviction tick removes them.
                    if msg.expires_at > now && similarity(text, &msg.text) > similarity_threshold
                    {
                        n += 1;
                    }
                }
                partition.messages.push(record);
                n
            }
            None => {
                self.partitions.insert(
                    key.to_string(),
                    Partition {
                        messages: vec![record],
                        expires_at,
                    },
                );
                0
            }
        }
    }

    /// Purge expired state. Two-tier policy: a partition whose own deadline
    /// passed is dropped outright without scanning its records (the cheap
    /// path for long-idle keys); an active partition is pruned record by
    /// record and dropped if that empties it. Idempotent for a fixed `now`.
    pub fn evict(&mut self, now: DateTime<Utc>) {
        let before = self.partitions.len();
        self.partitions.retain(|_, partition| {
            if partition.expires_at < now {
                return false;
            }
            partition.messages.retain(|msg| msg.expires_at > now);
            !partition.messages.is_empty()
        });
        let dropped = before - self.partitions.len();
        if dropped > 0 {
            debug!(
                target: "declutter",
                dropped,
                remaining = self.partitions.len(),
                "evicted expired partitions"
            );
        }
    }

    /// Drop all history (disable/teardown path).
    pub fn clear(&mut self) {
        self.partitions.clear();
    }

    /// Number of live partitions.
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 0.8;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("valid test timestamp")
    }

    fn cache_30s() -> RepetitionCache {
        RepetitionCache::new(Duration::seconds(30))
    }

    #[test]
    fn first_message_for_key_returns_zero() {
        let mut cache = cache_30s();
        assert_eq!(cache.record_and_score("*", "hello", THRESHOLD, at(0)), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn identical_burst_counts_up() {
        let mut cache = cache_30s();
        assert_eq!(cache.record_and_score("*", "hello", THRESHOLD, at(0)), 0);
        assert_eq!(cache.record_and_score("*", "hello", THRESHOLD, at(1)), 1);
        assert_eq!(cache.record_and_score("*", "hello", THRESHOLD, at(2)), 2);
        assert_eq!(cache.record_and_score("*", "hello", THRESHOLD, at(3)), 3);
    }

    #[test]
    fn near_duplicates_count_too() {
        let mut cache = cache_30s();
        cache.record_and_score("*", "buy followers at example.com", THRESHOLD, at(0));
        let n = cache.record_and_score("*", "buy followers at example.com!!", THRESHOLD, at(1));
        assert_eq!(n, 1);
    }

    #[test]
    fn dissimilar_messages_do_not_count() {
        let mut cache = cache_30s();
        cache.record_and_score("*", "hello there", THRESHOLD, at(0));
        assert_eq!(
            cache.record_and_score("*", "completely different", THRESHOLD, at(1)),
            0
        );
    }

    #[test]
    fn keys_are_isolated() {
        let mut cache = cache_30s();
        assert_eq!(cache.record_and_score("alice", "spam", THRESHOLD, at(0)), 0);
        assert_eq!(cache.record_and_score("bob", "spam", THRESHOLD, at(1)), 0);
        assert_eq!(cache.record_and_score("alice", "spam", THRESHOLD, at(2)), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn shared_key_mixes_authorship() {
        let mut cache = cache_30s();
        assert_eq!(cache.record_and_score("*", "spam", THRESHOLD, at(0)), 0);
        // Same text "from someone else" still lands in the shared partition.
        assert_eq!(cache.record_and_score("*", "spam", THRESHOLD, at(1)), 1);
    }

    #[test]
    fn idle_partition_evicted_whole() {
        let mut cache = cache_30s();
        cache.record_and_score("*", "hello", THRESHOLD, at(0));
        // TTL is 30s; at t=31 the partition deadline (t=30) has passed.
        cache.evict(at(31));
        assert!(cache.is_empty());
        // Fresh ingestion behaves as first-ever.
        assert_eq!(cache.record_and_score("*", "hello", THRESHOLD, at(32)), 0);
    }

    #[test]
    fn active_partition_prunes_old_records() {
        let mut cache = cache_30s();
        cache.record_and_score("*", "old spam", THRESHOLD, at(0));
        // Fresh traffic at t=20 re-stamps the partition deadline to t=50.
        cache.record_and_score("*", "new topic", THRESHOLD, at(20));
        // At t=35 the first record (deadline t=30) is expired but the
        // partition (deadline t=50) survives.
        cache.evict(at(35));
        assert_eq!(cache.len(), 1);
        // The pruned record no longer contributes to counts.
        assert_eq!(cache.record_and_score("*", "old spam", THRESHOLD, at(36)), 0);
    }

    #[test]
    fn expired_record_excluded_from_scan_before_eviction() {
        let mut cache = cache_30s();
        cache.record_and_score("*", "spam", THRESHOLD, at(0));
        cache.record_and_score("*", "unrelated chatter", THRESHOLD, at(20));
        // No evict tick has run, but the first record expired at t=30.
        assert_eq!(cache.record_and_score("*", "spam", THRESHOLD, at(35)), 0);
    }

    #[test]
    fn partition_emptied_by_pruning_is_removed() {
        let mut cache = cache_30s();
        cache.record_and_score("*", "hello", THRESHOLD, at(0));
        // At exactly t=30 the record is pruned (kept only while strictly
        // newer) but the partition survives the cheap path (dropped only
        // when strictly older); emptying it must still remove it.
        cache.evict(at(30));
        assert!(cache.is_empty());
    }

    #[test]
    fn evict_is_idempotent() {
        let mut cache = cache_30s();
        cache.record_and_score("*", "hello", THRESHOLD, at(0));
        cache.record_and_score("*", "hello", THRESHOLD, at(1));
        cache.evict(at(10));
        cache.evict(at(10));
        cache.evict(at(10));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.record_and_score("*", "hello", THRESHOLD, at(11)), 2);
    }

    #[test]
    fn clear_drops_everything() {
        let mut cache = cache_30s();
        cache.record_and_score("a", "x", THRESHOLD, at(0));
        cache.record_and_score("b", "y", THRESHOLD, at(0));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn set_ttl_applies_to_future_records_only() {
        let mut cache = cache_30s();
        cache.record_and_score("*", "hello", THRESHOLD, at(0));
        cache.set_ttl(Duration::seconds(300));
        cache.record_and_score("*", "hello", THRESHOLD, at(1));
        // First record keeps its t=30 deadline; at t=60 only the second
        // survives and the partition (deadline t=301) stays alive.
        cache.evict(at(60));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.record_and_score("*", "hello", THRESHOLD, at(61)), 1);
    }
}
