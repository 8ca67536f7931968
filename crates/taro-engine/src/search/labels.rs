//! Label pool, per-edge dominance sets, and the reusable query context.
//!
//! Labels live in a contiguous pool; parents are indices, never references.
//! Each touched edge keeps a small list of non-dominated active label ids.
//! The context belongs to one worker thread and is reset at query entry;
//! resetting drops the per-edge and per-node maps entirely so thread-local
//! memory stays bounded by the last query's touched set, not the graph.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use taro_common::{EdgeId, LabelId, NodeId, Ticks};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Label {
    pub edge: EdgeId,
    pub cost: f64,
    pub arrival: Ticks,
    pub parent: LabelId,
}

/// Append-only label pool; a label's id is its index.
#[derive(Debug, Default)]
pub struct LabelStore {
    labels: Vec<Label>,
}

impl LabelStore {
    #[inline]
    pub fn push(&mut self, label: Label) -> LabelId {
        let id = LabelId(self.labels.len() as u32);
        self.labels.push(label);
        id
    }

    #[inline]
    pub fn get(&self, id: LabelId) -> &Label {
        &self.labels[id.index()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn clear(&mut self) {
        self.labels.clear();
    }
}

/// Forward frontier element. Min-order: priority, then arrival, then edge
/// id, then label id — fully deterministic for equal priorities.
#[derive(Debug, Clone, Copy)]
pub struct FwdItem {
    pub priority: f64,
    pub cost: f64,
    pub arrival: Ticks,
    pub edge: EdgeId,
    pub label: LabelId,
}

impl PartialEq for FwdItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for FwdItem {}

impl Ord for FwdItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap, we want the smallest on top
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.arrival.cmp(&self.arrival))
            .then_with(|| other.edge.cmp(&self.edge))
            .then_with(|| other.label.cmp(&self.label))
    }
}

impl PartialOrd for FwdItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Backward frontier element: lower-bound distance to the target proxy.
#[derive(Debug, Clone, Copy)]
pub struct BwdItem {
    pub distance: f64,
    pub node: NodeId,
}

impl PartialEq for BwdItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for BwdItem {}

impl Ord for BwdItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for BwdItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-thread scratch for one query: pool, frontiers, dominance sets, and
/// the backward search's distance/settled maps.
#[derive(Debug, Default)]
pub struct QueryContext {
    pub store: LabelStore,
    active: FxHashMap<u32, SmallVec<[u32; 4]>>,
    pub fwd_frontier: BinaryHeap<FwdItem>,
    pub bwd_frontier: BinaryHeap<BwdItem>,
    pub reverse_best: FxHashMap<u32, f64>,
    pub bwd_settled: FxHashSet<u32>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for the next query. The pool and frontier allocations are kept
    /// (they amortize), the per-edge and per-node maps are dropped.
    pub fn reset(&mut self) {
        self.store.clear();
        self.fwd_frontier.clear();
        self.bwd_frontier.clear();
        self.active = FxHashMap::default();
        self.reverse_best = FxHashMap::default();
        self.bwd_settled = FxHashSet::default();
    }

    /// Dominance-preserving insertion. Returns the new label's id, or `None`
    /// when an active label on the same edge is at least as good in both
    /// cost and arrival.
    pub fn try_insert(&mut self, label: Label) -> Option<LabelId> {
        let entry = self.active.entry(label.edge.0).or_default();

        for &existing_id in entry.iter() {
            let existing = self.store.get(LabelId(existing_id));
            if existing.cost <= label.cost && existing.arrival <= label.arrival {
                return None;
            }
        }
        // drop every active label the newcomer dominates
        entry.retain(|&mut existing_id| {
            let existing = self.store.get(LabelId(existing_id));
            !(label.cost <= existing.cost && label.arrival <= existing.arrival)
        });

        let id = self.store.push(label);
        self.active.entry(label.edge.0).or_default().push(id.0);
        Some(id)
    }

    /// Whether a popped frontier entry still represents an active label.
    #[inline]
    pub fn is_current(&self, edge: EdgeId, label: LabelId) -> bool {
        self.active
            .get(&edge.0)
            .is_some_and(|ids| ids.contains(&label.0))
    }

    /// Capacity of the per-edge dominance map; zero after a reset.
    pub fn edge_map_capacity(&self) -> usize {
        self.active.capacity()
    }
}
