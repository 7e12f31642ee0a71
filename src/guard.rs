// =============================================================================
// guard.rs — THE ESCALATION GUARD TOWER
// =============================================================================
//
// A hybrid Bloom filter + LRU cache sitting in front of the escalation
// scheduler, remembering which lapsed deadlines this process has already
// handled. Escalating the same dispute twice would mean mailing a bureau
// two identical "you missed your deadline" packets, which undermines the
// moral high ground somewhat.
//
// To be clear about the chain of command: the PERSISTED document tags are
// the sole correctness guarantee. This guard is a fast path and nothing
// more — when it says "first time", the tag check still runs; when it
// says "seen it", the caller verifies against the persisted marker before
// believing it. A guard that could suppress a first escalation on its own
// authority would be a bug wearing a performance optimization costume.
//
// The mechanics:
//
// 1. The Bloom filter answers first. "Never seen" is authoritative —
//    Bloom filters have no false negatives.
// 2. "Maybe seen" gets arbitrated by the LRU cache, which keeps exact
//    keys and therefore exact answers, bounded in memory.
// 3. The Bloom filter rotates on an interval so it can't saturate into
//    a filter that answers "maybe" to everything.
//
// Is a probabilistic data structure necessary for a corpus of maybe a few
// hundred disputes? No. Was it ever necessary? Also no. Are we keeping
// it? Obviously.
// =============================================================================

use bloomfilter::Bloom;
use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// In-process memory of already-escalated deadline keys. Thread-safe,
/// because the scheduler promises re-entrancy and we intend to keep it.
pub struct EscalationGuard {
    /// First line: probabilistic, fast, never falsely says "new".
    bloom: Arc<RwLock<Bloom<String>>>,

    /// Second line: exact and bounded. When the bloom says "maybe",
    /// this says "yes" or "no" and means it.
    lru: Arc<RwLock<LruCache<String, bool>>>,

    /// When the bloom filter was last replaced with a fresh one.
    last_rotation: Arc<RwLock<Instant>>,

    rotation_interval_secs: u64,
    expected_items: u64,
    fp_rate: f64,

    pub stats: Arc<GuardStats>,
}

/// Counters for the status endpoint. Atomic, lock-free, and mostly here
/// so we can watch the guard do its job from a browser tab.
pub struct GuardStats {
    /// Keys checked against the guard.
    pub checks: portable_atomic::AtomicU64,
    /// Keys the guard had never seen (escalation proceeded).
    pub first_passes: portable_atomic::AtomicU64,
    /// Keys the guard remembered (fast-path skip candidates).
    pub repeats: portable_atomic::AtomicU64,
    /// Times the bloom said "maybe" and the LRU had to arbitrate.
    pub bloom_arbitrations: portable_atomic::AtomicU64,
    /// Bloom filter rotations performed.
    pub rotations: portable_atomic::AtomicU64,
}

impl GuardStats {
    fn new() -> Self {
        Self {
            checks: portable_atomic::AtomicU64::new(0),
            first_passes: portable_atomic::AtomicU64::new(0),
            repeats: portable_atomic::AtomicU64::new(0),
            bloom_arbitrations: portable_atomic::AtomicU64::new(0),
            rotations: portable_atomic::AtomicU64::new(0),
        }
    }
}

impl EscalationGuard {
    /// # Arguments
    /// * `expected_items` - guard keys expected before a rotation
    /// * `fp_rate` - bloom false positive target (a false positive costs
    ///   one redundant marker check, not a missed escalation)
    /// * `lru_capacity` - exact-answer cache bound
    /// * `rotation_interval_secs` - seconds between bloom rotations
    pub fn new(
        expected_items: u64,
        fp_rate: f64,
        lru_capacity: usize,
        rotation_interval_secs: u64,
    ) -> Self {
        info!(
            expected_items = expected_items,
            fp_rate = fp_rate,
            lru_capacity = lru_capacity,
            rotation_secs = rotation_interval_secs,
            "Escalation guard online — duplicate follow-up packets will not ship"
        );

        let bloom = Bloom::new_for_fp_rate(expected_items as usize, fp_rate);
        let lru_size = NonZeroUsize::new(lru_capacity).unwrap_or(NonZeroUsize::new(1000).unwrap());

        Self {
            bloom: Arc::new(RwLock::new(bloom)),
            lru: Arc::new(RwLock::new(LruCache::new(lru_size))),
            last_rotation: Arc::new(RwLock::new(Instant::now())),
            rotation_interval_secs,
            expected_items,
            fp_rate,
            stats: Arc::new(GuardStats::new()),
        }
    }

    /// Check whether this deadline key has been handled before, and mark
    /// it handled either way.
    ///
    /// Returns `true` for a first sighting. Returns `false` when the
    /// guard remembers the key — which the CALLER must still confirm
    /// against the persisted marker before skipping anything.
    pub fn check_and_insert(&self, key: &str) -> bool {
        use portable_atomic::Ordering;

        self.stats.checks.fetch_add(1, Ordering::Relaxed);
        self.maybe_rotate();

        let bloom_maybe = {
            let bloom = self.bloom.read();
            bloom.check(&key.to_string())
        };

        if bloom_maybe {
            // Bloom filters lie in exactly one direction. Ask the LRU.
            self.stats.bloom_arbitrations.fetch_add(1, Ordering::Relaxed);

            let mut lru = self.lru.write();
            if lru.get(&key.to_string()).is_some() {
                self.stats.repeats.fetch_add(1, Ordering::Relaxed);
                debug!(key = key, "Guard: deadline already handled this process");
                return false;
            }

            debug!(key = key, "Guard: bloom false positive, LRU overruled it");
        }

        {
            let mut bloom = self.bloom.write();
            bloom.set(&key.to_string());
        }
        {
            let mut lru = self.lru.write();
            lru.put(key.to_string(), true);
        }

        self.stats.first_passes.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Swap in a fresh bloom filter when the current one has been serving
    /// long enough to drift toward saturation. The LRU is left alone — it
    /// evicts on its own schedule. After a rotation the guard forgets,
    /// and the persisted marker check quietly covers for it while the
    /// guard re-learns.
    fn maybe_rotate(&self) {
        let should_rotate = {
            let last = self.last_rotation.read();
            last.elapsed().as_secs() >= self.rotation_interval_secs
        };

        if should_rotate {
            let mut bloom = self.bloom.write();
            let mut last = self.last_rotation.write();

            // Re-check under the write lock; another tick may have
            // rotated while we waited.
            if last.elapsed().as_secs() >= self.rotation_interval_secs {
                *bloom = Bloom::new_for_fp_rate(self.expected_items as usize, self.fp_rate);
                *last = Instant::now();

                self.stats.rotations.fetch_add(1, portable_atomic::Ordering::Relaxed);
                info!("Escalation guard bloom rotated — starting from a clean filter");
            }
        }
    }

    /// Point-in-time counters for the status endpoint.
    pub fn snapshot(&self) -> GuardSnapshot {
        use portable_atomic::Ordering;
        GuardSnapshot {
            checks: self.stats.checks.load(Ordering::Relaxed),
            first_passes: self.stats.first_passes.load(Ordering::Relaxed),
            repeats: self.stats.repeats.load(Ordering::Relaxed),
            bloom_arbitrations: self.stats.bloom_arbitrations.load(Ordering::Relaxed),
            rotations: self.stats.rotations.load(Ordering::Relaxed),
            lru_entries: self.lru.read().len(),
        }
    }
}

/// Serializable guard counters at a point in time.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GuardSnapshot {
    pub checks: u64,
    pub first_passes: u64,
    pub repeats: u64,
    pub bloom_arbitrations: u64,
    pub rotations: u64,
    pub lru_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> EscalationGuard {
        EscalationGuard::new(1000, 0.01, 100, 3600)
    }

    #[test]
    fn test_first_sighting_passes() {
        let g = guard();
        assert!(g.check_and_insert("d1:2026-03-15"));
    }

    #[test]
    fn test_repeat_sighting_is_remembered() {
        let g = guard();
        assert!(g.check_and_insert("d1:2026-03-15"));
        assert!(!g.check_and_insert("d1:2026-03-15"));
    }

    #[test]
    fn test_distinct_deadlines_are_distinct_keys() {
        let g = guard();
        assert!(g.check_and_insert("d1:2026-03-15"));
        // Same dispute, later deadline: a different lapse, a fresh pass.
        assert!(g.check_and_insert("d1:2026-04-30"));
    }

    #[test]
    fn test_snapshot_counts_passes_and_repeats() {
        let g = guard();
        g.check_and_insert("d1:2026-03-15");
        g.check_and_insert("d1:2026-03-15");
        g.check_and_insert("d2:2026-03-16");
        let snap = g.snapshot();
        assert_eq!(snap.checks, 3);
        assert_eq!(snap.first_passes, 2);
        assert_eq!(snap.repeats, 1);
        assert_eq!(snap.lru_entries, 2);
    }
}
