//! Programmatic model construction for tests and examples.
//!
//! Mirrors the role the binary loader plays in production: everything the
//! engine consumes comes out as the same immutable `Arc` views. Panics on
//! misuse (unknown node names, invalid CSR input) since callers are tests.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use taro_common::{EdgeId, NodeId, ProfileId};

use crate::landmarks::LandmarkArtifact;
use crate::mapper::IdMapper;
use crate::metadata::{ModelMetadata, TimeUnit};
use crate::profiles::{Profile, ProfileStore};
use crate::spatial::KdTree;
use crate::topology::{Coordinate, GraphTopology};
use crate::turns::TurnTable;

pub struct FixtureBuilder {
    names: Vec<String>,
    coords: Vec<Option<(f64, f64)>>,
    index: FxHashMap<String, usize>,
    edges: Vec<EdgeSpec>,
    profiles: Vec<Profile>,
    turns: Vec<TurnSpec>,
    timezone: String,
    time_unit: TimeUnit,
}

struct EdgeSpec {
    origin: usize,
    target: usize,
    weight: f64,
    profile: u32,
}

struct TurnSpec {
    from: (usize, usize),
    to: (usize, usize),
    penalty: f64,
}

/// Everything a test needs to stand up an engine.
pub struct Fixture {
    pub metadata: ModelMetadata,
    pub topology: Arc<GraphTopology>,
    pub profiles: Arc<ProfileStore>,
    pub turns: Arc<TurnTable>,
    pub mapper: Arc<IdMapper>,
    pub spatial: Option<Arc<KdTree>>,
}

impl Default for FixtureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureBuilder {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            coords: Vec::new(),
            index: FxHashMap::default(),
            edges: Vec::new(),
            profiles: Vec::new(),
            turns: Vec::new(),
            timezone: "UTC".into(),
            time_unit: TimeUnit::Seconds,
        }
    }

    /// Add coordinate-less nodes in bulk.
    pub fn nodes<const N: usize>(mut self, names: [&str; N]) -> Self {
        for name in names {
            self.push_node(name, None);
        }
        self
    }

    /// Add one node with a coordinate.
    pub fn node_at(mut self, name: &str, x: f64, y: f64) -> Self {
        self.push_node(name, Some((x, y)));
        self
    }

    fn push_node(&mut self, name: &str, coord: Option<(f64, f64)>) {
        if self.index.contains_key(name) {
            panic!("fixture already has node '{name}'");
        }
        self.index.insert(name.to_string(), self.names.len());
        self.names.push(name.to_string());
        self.coords.push(coord);
    }

    fn node(&self, name: &str) -> usize {
        *self
            .index
            .get(name)
            .unwrap_or_else(|| panic!("fixture has no node '{name}'"))
    }

    pub fn edge(self, from: &str, to: &str, weight: f64) -> Self {
        self.edge_with_profile(from, to, weight, 0)
    }

    pub fn edge_with_profile(mut self, from: &str, to: &str, weight: f64, profile: u32) -> Self {
        let origin = self.node(from);
        let target = self.node(to);
        self.edges.push(EdgeSpec {
            origin,
            target,
            weight,
            profile,
        });
        self
    }

    pub fn profile(mut self, profile: Profile) -> Self {
        self.profiles.push(profile);
        self
    }

    /// Turn penalty between two edges, each named by its endpoint pair.
    pub fn turn(mut self, from: (&str, &str), to: (&str, &str), penalty: f64) -> Self {
        let from = (self.node(from.0), self.node(from.1));
        let to = (self.node(to.0), self.node(to.1));
        self.turns.push(TurnSpec { from, to, penalty });
        self
    }

    pub fn timezone(mut self, zone: &str) -> Self {
        self.timezone = zone.to_string();
        self
    }

    pub fn time_unit(mut self, unit: TimeUnit) -> Self {
        self.time_unit = unit;
        self
    }

    pub fn build(mut self) -> Fixture {
        let n = self.names.len();

        // CSR wants edges grouped by origin; keep insertion order within a group
        self.edges.sort_by_key(|e| e.origin);

        let mut first_edge = vec![0u32; n + 1];
        for e in &self.edges {
            first_edge[e.origin + 1] += 1;
        }
        for v in 0..n {
            first_edge[v + 1] += first_edge[v];
        }
        let edge_target: Vec<u32> = self.edges.iter().map(|e| e.target as u32).collect();
        let edge_origin: Vec<u32> = self.edges.iter().map(|e| e.origin as u32).collect();
        let base_weights: Vec<f64> = self.edges.iter().map(|e| e.weight).collect();
        let edge_profile_id: Vec<u32> = self.edges.iter().map(|e| e.profile).collect();

        let coordinates = if self.coords.iter().any(Option::is_some) {
            Some(
                self.coords
                    .iter()
                    .map(|c| match c {
                        Some((x, y)) => Coordinate::new(*x, *y),
                        None => Coordinate::new(f64::NAN, f64::NAN),
                    })
                    .collect::<Vec<_>>(),
            )
        } else {
            None
        };

        let topology = GraphTopology::new(
            first_edge,
            edge_target,
            edge_origin,
            base_weights,
            edge_profile_id,
            coordinates,
        )
        .expect("fixture topology must be valid");

        let find_edge = |from: usize, to: usize| -> EdgeId {
            self.edges
                .iter()
                .position(|e| e.origin == from && e.target == to)
                .map(|i| EdgeId(i as u32))
                .unwrap_or_else(|| panic!("fixture has no edge {from} -> {to}"))
        };
        let turn_entries: Vec<(EdgeId, EdgeId, f64)> = self
            .turns
            .iter()
            .map(|t| {
                (
                    find_edge(t.from.0, t.from.1),
                    find_edge(t.to.0, t.to.1),
                    t.penalty,
                )
            })
            .collect();

        let spatial = topology
            .coordinates()
            .and_then(KdTree::build)
            .map(Arc::new);

        Fixture {
            metadata: ModelMetadata::new("fixture", self.time_unit, self.timezone.clone()),
            topology: Arc::new(topology),
            profiles: Arc::new(ProfileStore::new(self.profiles).expect("fixture profiles valid")),
            turns: Arc::new(TurnTable::new(turn_entries).expect("fixture turns valid")),
            mapper: Arc::new(IdMapper::new(self.names).expect("fixture ids unique")),
            spatial,
        }
    }
}

impl Fixture {
    /// Internal id of the first edge between two named nodes.
    pub fn edge_between(&self, from: &str, to: &str) -> EdgeId {
        let from = self.mapper.internal(from).expect("known node");
        let to = self.mapper.internal(to).expect("known node");
        self.topology
            .out_edges(from)
            .find(|&e| self.topology.target(e) == to)
            .unwrap_or_else(|| panic!("no edge {from:?} -> {to:?}"))
    }

    pub fn node(&self, name: &str) -> NodeId {
        self.mapper.internal(name).expect("known node")
    }

    /// Exact landmark artifact over free-flow weights.
    pub fn landmarks(&self, names: &[&str]) -> Arc<LandmarkArtifact> {
        let weights: Vec<f64> = (0..self.topology.edge_count())
            .map(|e| self.topology.base_weight(EdgeId(e as u32)))
            .collect();
        let nodes: Vec<NodeId> = names.iter().map(|n| self.node(n)).collect();
        Arc::new(LandmarkArtifact::compute(
            &self.topology,
            &weights,
            &nodes,
            self.profiles.fingerprint(),
        ))
    }
}
