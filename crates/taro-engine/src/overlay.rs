//! TTL-bounded per-edge speed-factor overrides.
//!
//! Writers replace the snapshot under a lock; queries clone the current
//! `Arc` once at entry, so every cost call within one query observes the
//! same overlay state. Capacity is enforced by evicting the entry with the
//! earliest expiry (ties to the smaller edge id).

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;
use taro_common::{EdgeId, Ticks};
use tracing::debug;

/// One override: `speed_factor = 0` blocks the edge while valid, a positive
/// factor divides the base weight. Non-finite or negative factors are
/// sanitized to 0 (blocked) at ingest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveUpdate {
    pub edge: EdgeId,
    pub speed_factor: f64,
    pub valid_until: Ticks,
}

impl LiveUpdate {
    pub fn new(edge: EdgeId, speed_factor: f64, valid_until: Ticks) -> Self {
        Self {
            edge,
            speed_factor,
            valid_until,
        }
    }
}

/// Batch-ingest accounting. The three counts always sum to the batch size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub accepted: usize,
    pub rejected_expired_at_ingest: usize,
    pub rejected_capacity: usize,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.accepted + self.rejected_expired_at_ingest + self.rejected_capacity
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct OverlayEntry {
    speed_factor: f64,
    valid_until: Ticks,
}

/// Immutable view of the overlay a query samples once at entry.
#[derive(Debug, Default, Clone)]
pub struct OverlaySnapshot {
    entries: FxHashMap<u32, OverlayEntry>,
    // expiry-ordered index; drives deterministic eviction
    by_expiry: BTreeSet<(Ticks, u32)>,
}

impl OverlaySnapshot {
    /// Speed factor for `edge` if an entry is valid at `now`.
    #[inline]
    pub fn factor_at(&self, edge: EdgeId, now: Ticks) -> Option<f64> {
        self.entries
            .get(&edge.0)
            .filter(|e| e.valid_until > now)
            .map(|e| e.speed_factor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove(&mut self, edge: u32) {
        if let Some(old) = self.entries.remove(&edge) {
            self.by_expiry.remove(&(old.valid_until, edge));
        }
    }

    fn insert(&mut self, edge: u32, entry: OverlayEntry) {
        self.remove(edge);
        self.by_expiry.insert((entry.valid_until, edge));
        self.entries.insert(edge, entry);
    }

    /// `(valid_until, edge)` of the entry that would be evicted next.
    fn eviction_candidate(&self) -> Option<(Ticks, u32)> {
        self.by_expiry.first().copied()
    }
}

#[derive(Debug)]
pub struct LiveOverlay {
    capacity: usize,
    state: RwLock<Arc<OverlaySnapshot>>,
    batches: AtomicU64,
}

impl LiveOverlay {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: RwLock::new(Arc::new(OverlaySnapshot::default())),
            batches: AtomicU64::new(0),
        }
    }

    /// Batches ingested since construction.
    pub fn batch_count(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The consistent view for one query. Cheap: one `Arc` clone under the
    /// read lock.
    pub fn snapshot(&self) -> Arc<OverlaySnapshot> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Ingest one update; equivalent to a one-element batch.
    pub fn upsert(&self, update: LiveUpdate, now: Ticks) -> BatchOutcome {
        self.apply_batch(&[update], now)
    }

    /// Atomically ingest a batch. Readers observe either the previous or the
    /// new snapshot, never a partial one.
    pub fn apply_batch(&self, updates: &[LiveUpdate], now: Ticks) -> BatchOutcome {
        let mut guard = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut next: OverlaySnapshot = (**guard).clone();
        let mut outcome = BatchOutcome::default();

        for update in updates {
            if update.valid_until <= now {
                outcome.rejected_expired_at_ingest += 1;
                continue;
            }
            let factor = if update.speed_factor.is_finite() && update.speed_factor >= 0.0 {
                update.speed_factor
            } else {
                0.0
            };
            let entry = OverlayEntry {
                speed_factor: factor,
                valid_until: update.valid_until,
            };

            if next.entries.contains_key(&update.edge.0) {
                next.insert(update.edge.0, entry);
                outcome.accepted += 1;
                continue;
            }
            if next.len() < self.capacity {
                next.insert(update.edge.0, entry);
                outcome.accepted += 1;
                continue;
            }
            // full: the incoming update competes with the earliest-expiring
            // entry; it only displaces something strictly behind it
            match next.eviction_candidate() {
                Some((evict_until, evict_edge))
                    if (update.valid_until, update.edge.0) > (evict_until, evict_edge) =>
                {
                    next.remove(evict_edge);
                    next.insert(update.edge.0, entry);
                    outcome.accepted += 1;
                }
                _ => outcome.rejected_capacity += 1,
            }
        }

        debug!(
            accepted = outcome.accepted,
            rejected_expired = outcome.rejected_expired_at_ingest,
            rejected_capacity = outcome.rejected_capacity,
            size = next.len(),
            "overlay batch applied"
        );
        *guard = Arc::new(next);
        self.batches.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    /// Drop entries whose validity ended at or before `now`. Returns how
    /// many were removed.
    pub fn purge_expired(&self, now: Ticks) -> usize {
        let mut guard = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut next: OverlaySnapshot = (**guard).clone();
        let mut removed = 0;
        while let Some((until, edge)) = next.eviction_candidate() {
            if until > now {
                break;
            }
            next.remove(edge);
            removed += 1;
        }
        if removed > 0 {
            *guard = Arc::new(next);
        }
        removed
    }
}
