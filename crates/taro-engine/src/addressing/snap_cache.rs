//! Segmented, cross-request snap cache.
//!
//! Segments are independently locked; a key hashes to exactly one segment
//! and eviction is FIFO within it. Keys canonicalize signed zero and NaN
//! coordinate bits so equal-looking coordinates always collide.

use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::{FxHashMap, FxHasher};
use taro_common::NodeId;

const CANONICAL_NAN_BITS: u64 = 0x7ff8_0000_0000_0000;

/// Bit-canonical form of an `f64` for hashing: `-0.0` folds into `0.0`,
/// every NaN folds into one quiet NaN.
#[inline]
pub fn canonical_bits(v: f64) -> u64 {
    if v.is_nan() {
        CANONICAL_NAN_BITS
    } else if v == 0.0 {
        0
    } else {
        v.to_bits()
    }
}

/// Full identity of one snap resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapKey {
    pub graph_fingerprint: u64,
    pub mapper_fingerprint: u64,
    pub trait_id: &'static str,
    pub strategy_index: u32,
    pub max_snap_bits: u64,
    pub x_bits: u64,
    pub y_bits: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedSnap {
    pub node: NodeId,
    pub snap_distance: f64,
}

#[derive(Debug, Default)]
struct Segment {
    map: FxHashMap<SnapKey, CachedSnap>,
    order: VecDeque<SnapKey>,
}

#[derive(Debug)]
pub struct SegmentedSnapCache {
    segments: Vec<Mutex<Segment>>,
    segment_capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SegmentedSnapCache {
    /// `segment_count` is rounded up to a power of two and clamped to
    /// `capacity`; each segment owns an equal share of the total.
    pub fn new(capacity: usize, segment_count: usize) -> Self {
        let capacity = capacity.max(1);
        let segment_count = segment_count
            .max(1)
            .next_power_of_two()
            .min(capacity.next_power_of_two());
        let segment_capacity = capacity.div_ceil(segment_count).max(1);
        let segments = (0..segment_count)
            .map(|_| Mutex::new(Segment::default()))
            .collect();
        Self {
            segments,
            segment_capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn segment_for(&self, key: &SnapKey) -> &Mutex<Segment> {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        let idx = hasher.finish() as usize & (self.segments.len() - 1);
        &self.segments[idx]
    }

    pub fn get(&self, key: &SnapKey) -> Option<CachedSnap> {
        let segment = self
            .segment_for(key)
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let hit = segment.map.get(key).copied();
        match hit {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        hit
    }

    pub fn insert(&self, key: SnapKey, value: CachedSnap) {
        let mut segment = self
            .segment_for(&key)
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if segment.map.insert(key.clone(), value).is_some() {
            // refreshed an existing key; insertion order is preserved
            return;
        }
        segment.order.push_back(key);
        if segment.order.len() > self.segment_capacity
            && let Some(oldest) = segment.order.pop_front()
        {
            segment.map.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.segments
            .iter()
            .map(|s| {
                s.lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .map
                    .len()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.segment_capacity * self.segments.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(x: f64, y: f64) -> SnapKey {
        SnapKey {
            graph_fingerprint: 1,
            mapper_fingerprint: 2,
            trait_id: "DEFAULT",
            strategy_index: 0,
            max_snap_bits: canonical_bits(1000.0),
            x_bits: canonical_bits(x),
            y_bits: canonical_bits(y),
        }
    }

    fn snap(node: u32) -> CachedSnap {
        CachedSnap {
            node: NodeId(node),
            snap_distance: 1.5,
        }
    }

    #[test]
    fn signed_zero_and_nan_canonicalize() {
        assert_eq!(canonical_bits(0.0), canonical_bits(-0.0));
        assert_eq!(
            canonical_bits(f64::NAN),
            canonical_bits(-f64::NAN)
        );
        assert_eq!(key(0.0, 1.0), key(-0.0, 1.0));
    }

    #[test]
    fn hit_and_miss_counting() {
        let cache = SegmentedSnapCache::new(8, 2);
        assert!(cache.get(&key(1.0, 1.0)).is_none());
        cache.insert(key(1.0, 1.0), snap(4));
        assert_eq!(cache.get(&key(1.0, 1.0)).unwrap().node, NodeId(4));
        assert_eq!(cache.hit_count(), 1);
        assert_eq!(cache.miss_count(), 1);
    }

    #[test]
    fn segment_count_rounds_to_power_of_two_and_respects_capacity() {
        let cache = SegmentedSnapCache::new(100, 3);
        assert_eq!(cache.segment_count(), 4);
        let tiny = SegmentedSnapCache::new(2, 64);
        assert!(tiny.segment_count() <= 2);
    }

    #[test]
    fn eviction_is_fifo_within_a_segment() {
        // single segment makes the order fully observable
        let cache = SegmentedSnapCache::new(2, 1);
        cache.insert(key(1.0, 0.0), snap(1));
        cache.insert(key(2.0, 0.0), snap(2));
        cache.insert(key(3.0, 0.0), snap(3));
        assert!(cache.get(&key(1.0, 0.0)).is_none());
        assert!(cache.get(&key(2.0, 0.0)).is_some());
        assert!(cache.get(&key(3.0, 0.0)).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn refreshing_a_key_does_not_grow_the_segment() {
        let cache = SegmentedSnapCache::new(2, 1);
        cache.insert(key(1.0, 0.0), snap(1));
        cache.insert(key(1.0, 0.0), snap(9));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key(1.0, 0.0)).unwrap().node, NodeId(9));
    }
}
