//! Landmark lower-bound artifact (ALT-style).
//!
//! The runtime consumes the artifact as two dense distance tables per
//! landmark (landmark-to-node and node-to-landmark) plus the signature of
//! the graph and profile store it was preprocessed against. Selection of
//! landmark nodes happens offline; `compute` exists so fixtures can build an
//! exact artifact from a weight vector.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use taro_common::NodeId;

use crate::topology::GraphTopology;

#[derive(Debug)]
pub struct LandmarkArtifact {
    node_count: usize,
    /// `from[l * node_count + v]` = distance landmark l -> node v.
    from_landmark: Vec<f64>,
    /// `to[l * node_count + v]` = distance node v -> landmark l.
    to_landmark: Vec<f64>,
    landmark_count: usize,
    graph_fingerprint: u64,
    profile_fingerprint: u64,
}

impl LandmarkArtifact {
    pub fn from_parts(
        node_count: usize,
        landmark_count: usize,
        from_landmark: Vec<f64>,
        to_landmark: Vec<f64>,
        graph_fingerprint: u64,
        profile_fingerprint: u64,
    ) -> Self {
        assert_eq!(from_landmark.len(), node_count * landmark_count);
        assert_eq!(to_landmark.len(), node_count * landmark_count);
        Self {
            node_count,
            from_landmark,
            to_landmark,
            landmark_count,
            graph_fingerprint,
            profile_fingerprint,
        }
    }

    /// Exact artifact over the given per-edge weights, one Dijkstra pair per
    /// landmark. Fixture-scale models only.
    pub fn compute(
        topology: &GraphTopology,
        weights: &[f64],
        landmarks: &[NodeId],
        profile_fingerprint: u64,
    ) -> Self {
        let n = topology.node_count();
        let mut from_landmark = Vec::with_capacity(n * landmarks.len());
        let mut to_landmark = Vec::with_capacity(n * landmarks.len());
        for &l in landmarks {
            from_landmark.extend(one_to_all(topology, weights, l, Direction::Forward));
            to_landmark.extend(one_to_all(topology, weights, l, Direction::Backward));
        }
        Self::from_parts(
            n,
            landmarks.len(),
            from_landmark,
            to_landmark,
            topology.fingerprint(),
            profile_fingerprint,
        )
    }

    #[inline]
    pub fn landmark_count(&self) -> usize {
        self.landmark_count
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    #[inline]
    pub fn signature(&self) -> (u64, u64) {
        (self.graph_fingerprint, self.profile_fingerprint)
    }

    /// ALT lower bound on the distance from `v` to `t`. Never negative;
    /// unreachable table entries (`+inf`) degrade to 0 rather than poison
    /// the bound.
    pub fn lower_bound(&self, v: NodeId, t: NodeId) -> f64 {
        let mut best = 0.0f64;
        for l in 0..self.landmark_count {
            let base = l * self.node_count;
            let from_v = self.from_landmark[base + v.index()];
            let from_t = self.from_landmark[base + t.index()];
            let to_v = self.to_landmark[base + v.index()];
            let to_t = self.to_landmark[base + t.index()];
            let by_from = from_t - from_v;
            let by_to = to_v - to_t;
            for cand in [by_from, by_to] {
                if cand.is_finite() && cand > best {
                    best = cand;
                }
            }
        }
        best
    }
}

enum Direction {
    Forward,
    Backward,
}

fn one_to_all(
    topology: &GraphTopology,
    weights: &[f64],
    source: NodeId,
    direction: Direction,
) -> Vec<f64> {
    let n = topology.node_count();
    let mut dist = vec![f64::INFINITY; n];
    // non-negative finite f64 bit patterns order like the values themselves
    let mut heap: BinaryHeap<Reverse<(u64, u32)>> = BinaryHeap::new();
    dist[source.index()] = 0.0;
    heap.push(Reverse((0, source.0)));

    while let Some(Reverse((d_bits, v))) = heap.pop() {
        let d = f64::from_bits(d_bits);
        if d > dist[v as usize] {
            continue;
        }
        match direction {
            Direction::Forward => {
                for e in topology.out_edges(NodeId(v)) {
                    let next = topology.target(e);
                    let nd = d + weights[e.index()];
                    if nd < dist[next.index()] {
                        dist[next.index()] = nd;
                        heap.push(Reverse((nd.to_bits(), next.0)));
                    }
                }
            }
            Direction::Backward => {
                for &e in topology.in_edges(NodeId(v)) {
                    let next = topology.origin(e);
                    let nd = d + weights[e.index()];
                    if nd < dist[next.index()] {
                        dist[next.index()] = nd;
                        heap.push(Reverse((nd.to_bits(), next.0)));
                    }
                }
            }
        }
    }
    dist
}
