//! Shared scaffolding: stand up a router over a fixture the way production
//! wires the loader's views into the engine.
#![allow(dead_code)] // each integration test binary uses a subset

use std::sync::Arc;

use taro_engine::{CostEngine, EngineConfig, LiveOverlay, Router};
use taro_model::fixture::{Fixture, FixtureBuilder};

pub struct TestEngine {
    pub router: Router,
    pub overlay: Arc<LiveOverlay>,
    pub fixture: Fixture,
}

pub fn build(fixture: Fixture, config: EngineConfig) -> TestEngine {
    build_with(fixture, config, None)
}

pub fn build_with_landmarks(fixture: Fixture, config: EngineConfig, landmarks: &[&str]) -> TestEngine {
    let artifact = fixture.landmarks(landmarks);
    build_with(fixture, config, Some(artifact))
}

fn build_with(
    fixture: Fixture,
    config: EngineConfig,
    landmarks: Option<Arc<taro_model::LandmarkArtifact>>,
) -> TestEngine {
    let overlay = Arc::new(LiveOverlay::new(64));
    let ticks_per_second = fixture.metadata.time_unit.ticks_per_second() as i64;
    let cost = Arc::new(CostEngine::new(
        fixture.topology.clone(),
        fixture.profiles.clone(),
        overlay.clone(),
        config.sampling,
        ticks_per_second,
    ));
    let router = Router::new(
        cost,
        fixture.topology.clone(),
        fixture.profiles.clone(),
        fixture.turns.clone(),
        fixture.mapper.clone(),
        fixture.spatial.clone(),
        landmarks,
        &fixture.metadata,
        config,
    )
    .expect("router binds");
    TestEngine {
        router,
        overlay,
        fixture,
    }
}

/// The five-node line `N0 -> N1 -> N2 -> N3 -> N4`, one second per edge.
pub fn chain5() -> Fixture {
    FixtureBuilder::new()
        .nodes(["N0", "N1", "N2", "N3", "N4"])
        .edge("N0", "N1", 1.0)
        .edge("N1", "N2", 1.0)
        .edge("N2", "N3", 1.0)
        .edge("N3", "N4", 1.0)
        .build()
}

/// Two disconnected components: `N0 -> N1` and `N2 -> N3`.
pub fn disconnected() -> Fixture {
    FixtureBuilder::new()
        .nodes(["N0", "N1", "N2", "N3"])
        .edge("N0", "N1", 1.0)
        .edge("N2", "N3", 1.0)
        .build()
}

/// A planar diamond with coordinates, for the geometric heuristics.
/// Shortest A->D goes over the top (cost 4); the bottom detour costs 6.
pub fn diamond() -> Fixture {
    FixtureBuilder::new()
        .node_at("A", 0.0, 0.0)
        .node_at("B", 2.0, 1.0)
        .node_at("C", 2.0, -3.0)
        .node_at("D", 4.0, 0.0)
        .edge("A", "B", 2.0)
        .edge("B", "D", 2.0)
        .edge("A", "C", 3.0)
        .edge("C", "D", 3.0)
        .build()
}
