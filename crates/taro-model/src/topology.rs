use taro_common::{EdgeId, NodeId, ProfileId, ReasonCode, RouteError};

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(weights: &[f64]) -> GraphTopology {
        // n nodes in a line, edge i goes i -> i+1
        let n = weights.len() + 1;
        let mut first_edge = Vec::with_capacity(n + 1);
        for v in 0..n {
            first_edge.push(v.min(weights.len()) as u32);
        }
        first_edge.push(weights.len() as u32);
        let targets: Vec<u32> = (1..n as u32).collect();
        let origins: Vec<u32> = (0..weights.len() as u32).collect();
        let profiles = vec![0u32; weights.len()];
        GraphTopology::new(first_edge, targets, origins, weights.to_vec(), profiles, None).unwrap()
    }

    #[test]
    fn csr_accessors() {
        let g = chain(&[1.0, 2.0, 3.0]);
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.out_edges(NodeId(0)).collect::<Vec<_>>(), vec![EdgeId(0)]);
        assert_eq!(g.target(EdgeId(1)), NodeId(2));
        assert_eq!(g.origin(EdgeId(2)), NodeId(2));
        assert_eq!(g.base_weight(EdgeId(1)), 2.0);
        assert!(g.out_edges(NodeId(3)).next().is_none());
    }

    #[test]
    fn reverse_index_mirrors_forward() {
        let g = chain(&[1.0, 1.0]);
        assert_eq!(g.in_edges(NodeId(0)), &[]);
        assert_eq!(g.in_edges(NodeId(1)), &[EdgeId(0)]);
        assert_eq!(g.in_edges(NodeId(2)), &[EdgeId(1)]);
    }

    #[test]
    fn rejects_non_monotone_first_edge() {
        let err = GraphTopology::new(
            vec![0, 2, 1, 2],
            vec![1, 2],
            vec![0, 0],
            vec![1.0, 1.0],
            vec![0, 0],
            None,
        )
        .unwrap_err();
        assert_eq!(err.code, ReasonCode::ModelTopologyInvalid);
    }

    #[test]
    fn rejects_origin_inconsistent_with_csr() {
        // edge 0 sits in node 0's CSR slice but claims origin 1
        let err = GraphTopology::new(
            vec![0, 1, 1],
            vec![1],
            vec![1],
            vec![1.0],
            vec![0],
            None,
        )
        .unwrap_err();
        assert_eq!(err.code, ReasonCode::ModelTopologyInvalid);
    }

    #[test]
    fn rejects_negative_and_non_finite_weights() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let err = GraphTopology::new(
                vec![0, 1, 1],
                vec![1],
                vec![0],
                vec![bad],
                vec![0],
                None,
            )
            .unwrap_err();
            assert_eq!(err.code, ReasonCode::ModelTopologyInvalid);
        }
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = chain(&[1.0, 2.0]);
        let b = chain(&[1.0, 2.0]);
        let c = chain(&[1.0, 3.0]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}

/// Planar or geographic node position.
///
/// The coordinate strategy decides the interpretation: XY treats the pair as
/// Euclidean units, LAT_LON as (latitude, longitude) degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Forward CSR view of the road network plus a derived reverse index.
///
/// Immutable after construction. The CSR invariant is
/// `first_edge[v] <= first_edge[v+1]` with `first_edge[node_count] = edge_count`,
/// and `edge_origin[e] = v` for every edge in node `v`'s slice.
#[derive(Debug)]
pub struct GraphTopology {
    first_edge: Vec<u32>,
    edge_target: Vec<u32>,
    edge_origin: Vec<u32>,
    base_weights: Vec<f64>,
    edge_profile_id: Vec<u32>,
    coordinates: Option<Vec<Coordinate>>,

    // reverse index, built once: incoming edge ids per node
    first_in: Vec<u32>,
    in_edges: Vec<EdgeId>,

    fingerprint: u64,
}

impl GraphTopology {
    pub fn new(
        first_edge: Vec<u32>,
        edge_target: Vec<u32>,
        edge_origin: Vec<u32>,
        base_weights: Vec<f64>,
        edge_profile_id: Vec<u32>,
        coordinates: Option<Vec<Coordinate>>,
    ) -> Result<Self, RouteError> {
        let invalid = |msg: String| RouteError::new(ReasonCode::ModelTopologyInvalid).with_message(msg);

        if first_edge.is_empty() {
            return Err(invalid("first_edge must have node_count + 1 entries".into()));
        }
        let node_count = first_edge.len() - 1;
        let edge_count = edge_target.len();

        if *first_edge.last().unwrap() as usize != edge_count {
            return Err(invalid(format!(
                "first_edge[{node_count}] = {} but edge count is {edge_count}",
                first_edge.last().unwrap()
            )));
        }
        if edge_origin.len() != edge_count
            || base_weights.len() != edge_count
            || edge_profile_id.len() != edge_count
        {
            return Err(invalid("edge array lengths disagree".into()));
        }
        if let Some(coords) = &coordinates
            && coords.len() != node_count
        {
            return Err(invalid(format!(
                "{} coordinates for {node_count} nodes",
                coords.len()
            )));
        }

        for v in 0..node_count {
            if first_edge[v] > first_edge[v + 1] {
                return Err(invalid(format!("first_edge not monotone at node {v}")));
            }
            for e in first_edge[v] as usize..first_edge[v + 1] as usize {
                if edge_origin[e] as usize != v {
                    return Err(invalid(format!(
                        "edge {e} lies in node {v}'s slice but records origin {}",
                        edge_origin[e]
                    )));
                }
            }
        }
        for (e, &t) in edge_target.iter().enumerate() {
            if t as usize >= node_count {
                return Err(invalid(format!("edge {e} targets out-of-range node {t}")));
            }
        }
        for (e, &w) in base_weights.iter().enumerate() {
            if !w.is_finite() || w < 0.0 {
                return Err(invalid(format!("edge {e} has invalid base weight {w}")));
            }
        }

        // reverse index: counting sort by target
        let mut first_in = vec![0u32; node_count + 1];
        for &t in &edge_target {
            first_in[t as usize + 1] += 1;
        }
        for v in 0..node_count {
            first_in[v + 1] += first_in[v];
        }
        let mut cursor = first_in.clone();
        let mut in_edges = vec![EdgeId(0); edge_count];
        for (e, &t) in edge_target.iter().enumerate() {
            in_edges[cursor[t as usize] as usize] = EdgeId(e as u32);
            cursor[t as usize] += 1;
        }

        let fingerprint = {
            let mut fp = Fnv::new();
            fp.update_u32s(&first_edge);
            fp.update_u32s(&edge_target);
            fp.update_u32s(&edge_origin);
            fp.update_f64s(&base_weights);
            fp.update_u32s(&edge_profile_id);
            if let Some(coords) = &coordinates {
                for c in coords {
                    fp.update_u64(c.x.to_bits());
                    fp.update_u64(c.y.to_bits());
                }
            }
            fp.finish()
        };

        Ok(Self {
            first_edge,
            edge_target,
            edge_origin,
            base_weights,
            edge_profile_id,
            coordinates,
            first_in,
            in_edges,
            fingerprint,
        })
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.first_edge.len() - 1
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edge_target.len()
    }

    #[inline]
    pub fn contains_node(&self, node: NodeId) -> bool {
        node.index() < self.node_count()
    }

    /// Outgoing edge ids of `node`, in CSR order.
    #[inline]
    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        let start = self.first_edge[node.index()];
        let end = self.first_edge[node.index() + 1];
        (start..end).map(EdgeId)
    }

    /// Incoming edge ids of `node`.
    #[inline]
    pub fn in_edges(&self, node: NodeId) -> &[EdgeId] {
        let start = self.first_in[node.index()] as usize;
        let end = self.first_in[node.index() + 1] as usize;
        &self.in_edges[start..end]
    }

    #[inline]
    pub fn target(&self, edge: EdgeId) -> NodeId {
        NodeId(self.edge_target[edge.index()])
    }

    #[inline]
    pub fn origin(&self, edge: EdgeId) -> NodeId {
        NodeId(self.edge_origin[edge.index()])
    }

    #[inline]
    pub fn base_weight(&self, edge: EdgeId) -> f64 {
        self.base_weights[edge.index()]
    }

    #[inline]
    pub fn profile_id(&self, edge: EdgeId) -> ProfileId {
        ProfileId(self.edge_profile_id[edge.index()])
    }

    #[inline]
    pub fn coordinate(&self, node: NodeId) -> Option<Coordinate> {
        self.coordinates.as_ref().map(|c| c[node.index()])
    }

    #[inline]
    pub fn has_coordinates(&self) -> bool {
        self.coordinates.is_some()
    }

    pub fn coordinates(&self) -> Option<&[Coordinate]> {
        self.coordinates.as_deref()
    }

    /// Structural fingerprint captured at construction; used for the
    /// identity checks at orchestrator startup.
    #[inline]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

/// FNV-1a, enough to bind artifacts to the arrays they were built from.
pub(crate) struct Fnv(u64);

impl Fnv {
    pub(crate) fn new() -> Self {
        Fnv(0xcbf29ce484222325)
    }

    #[inline]
    pub(crate) fn update_u64(&mut self, v: u64) {
        for byte in v.to_le_bytes() {
            self.0 ^= byte as u64;
            self.0 = self.0.wrapping_mul(0x100000001b3);
        }
    }

    pub(crate) fn update_u32s(&mut self, vs: &[u32]) {
        for &v in vs {
            self.update_u64(v as u64);
        }
    }

    pub(crate) fn update_f64s(&mut self, vs: &[f64]) {
        for &v in vs {
            self.update_u64(v.to_bits());
        }
    }

    pub(crate) fn finish(&self) -> u64 {
        self.0
    }
}
