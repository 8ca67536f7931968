mod common;

use common::{build, build_with_landmarks, chain5, diamond, disconnected};
use taro_common::ReasonCode;
use taro_engine::{
    AddressSlot, Algorithm, BudgetConfig, EngineConfig, HeuristicType, RouteRequest,
};

fn dijkstra(source: &str, target: &str, departure: i64) -> RouteRequest {
    RouteRequest::new(
        AddressSlot::external(source),
        AddressSlot::external(target),
        departure,
    )
    .algorithm(Algorithm::Dijkstra)
}

#[test]
fn linear_chain_route() {
    let engine = build(chain5(), EngineConfig::default());
    let response = engine.router.route(&dijkstra("N0", "N4", 10)).unwrap();
    assert!(response.reachable);
    assert_eq!(response.total_cost, 4.0);
    assert_eq!(response.arrival_ticks, 14);
    assert_eq!(response.path, vec!["N0", "N1", "N2", "N3", "N4"]);
    assert!(response.settled_states > 0);
}

#[test]
fn disconnected_route_is_unreachable() {
    let engine = build(disconnected(), EngineConfig::default());
    let response = engine.router.route(&dijkstra("N0", "N3", 7)).unwrap();
    assert!(!response.reachable);
    assert!(response.total_cost.is_infinite());
    assert_eq!(response.arrival_ticks, 7);
    assert!(response.path.is_empty());
}

#[test]
fn source_equals_target() {
    let engine = build(chain5(), EngineConfig::default());
    let response = engine.router.route(&dijkstra("N2", "N2", 99)).unwrap();
    assert!(response.reachable);
    assert_eq!(response.total_cost, 0.0);
    assert_eq!(response.arrival_ticks, 99);
    assert_eq!(response.path, vec!["N2"]);
}

#[test]
fn dijkstra_a_star_cost_parity() {
    // every admissible heuristic must land on the optimal cost
    let baseline = {
        let engine = build_with_landmarks(diamond(), EngineConfig::default(), &["A", "D"]);
        let response = engine.router.route(&dijkstra("A", "D", 0)).unwrap();
        response.total_cost
    };
    assert_eq!(baseline, 4.0);

    for heuristic in [
        HeuristicType::None,
        HeuristicType::Euclidean,
        HeuristicType::Spherical,
        HeuristicType::Landmark,
    ] {
        let engine = build_with_landmarks(diamond(), EngineConfig::default(), &["A", "D"]);
        let request = RouteRequest::new(
            AddressSlot::external("A"),
            AddressSlot::external("D"),
            0,
        )
        .algorithm(Algorithm::AStar)
        .heuristic(heuristic);
        let response = engine.router.route(&request).unwrap();
        assert_eq!(
            response.total_cost, baseline,
            "heuristic {heuristic:?} missed the optimum"
        );
        assert_eq!(response.arrival_ticks, 4);
    }
}

#[test]
fn repeat_requests_are_byte_identical() {
    let engine = build(chain5(), EngineConfig::default());
    let request = dijkstra("N0", "N4", 10);
    let mut a = engine.router.route(&request).unwrap();
    let mut b = engine.router.route(&request).unwrap();
    // wall-clock telemetry is the only nondeterministic field
    a.addressing.normalization_nanos = 0;
    b.addressing.normalization_nanos = 0;
    assert_eq!(a, b);
}

#[test]
fn responses_are_defensive_copies() {
    let engine = build(chain5(), EngineConfig::default());
    let request = dijkstra("N0", "N4", 10);
    let mut first = engine.router.route(&request).unwrap();
    first.path.clear();
    first.path.push("corrupted".into());
    let second = engine.router.route(&request).unwrap();
    assert_eq!(second.path, vec!["N0", "N1", "N2", "N3", "N4"]);
}

#[test]
fn missing_algorithm_is_rejected() {
    let engine = build(chain5(), EngineConfig::default());
    let request = RouteRequest::new(
        AddressSlot::external("N0"),
        AddressSlot::external("N4"),
        0,
    );
    let err = engine.router.route(&request).unwrap_err();
    assert_eq!(err.code, ReasonCode::AlgorithmRequired);
}

#[test]
fn dijkstra_with_a_heuristic_is_a_mismatch() {
    let engine = build(chain5(), EngineConfig::default());
    let request = dijkstra("N0", "N4", 0).heuristic(HeuristicType::Euclidean);
    let err = engine.router.route(&request).unwrap_err();
    assert_eq!(err.code, ReasonCode::DijkstraHeuristicMismatch);
}

#[test]
fn a_star_without_a_heuristic_is_rejected() {
    let engine = build(chain5(), EngineConfig::default());
    let request = RouteRequest::new(
        AddressSlot::external("N0"),
        AddressSlot::external("N4"),
        0,
    )
    .algorithm(Algorithm::AStar);
    let err = engine.router.route(&request).unwrap_err();
    assert_eq!(err.code, ReasonCode::HeuristicRequired);
}

#[test]
fn landmark_without_artifact_fails_configuration() {
    let engine = build(diamond(), EngineConfig::default());
    let request = RouteRequest::new(
        AddressSlot::external("A"),
        AddressSlot::external("D"),
        0,
    )
    .algorithm(Algorithm::AStar)
    .heuristic(HeuristicType::Landmark);
    let err = engine.router.route(&request).unwrap_err();
    assert_eq!(err.code, ReasonCode::HeuristicConfigurationFailed);
}

#[test]
fn empty_endpoints_name_their_slot() {
    let engine = build(chain5(), EngineConfig::default());
    let request = RouteRequest::new(AddressSlot::default(), AddressSlot::external("N4"), 0)
        .algorithm(Algorithm::Dijkstra);
    assert_eq!(
        engine.router.route(&request).unwrap_err().code,
        ReasonCode::SourceRequired
    );
    let request = RouteRequest::new(AddressSlot::external("N0"), AddressSlot::default(), 0)
        .algorithm(Algorithm::Dijkstra);
    assert_eq!(
        engine.router.route(&request).unwrap_err().code,
        ReasonCode::TargetRequired
    );
}

#[test]
fn budget_breaches_are_deterministic() {
    let config = EngineConfig {
        budgets: BudgetConfig {
            settled: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    let engine = build(chain5(), config);
    let request = dijkstra("N0", "N4", 0);
    let first = engine.router.route(&request).unwrap_err();
    let second = engine.router.route(&request).unwrap_err();
    assert_eq!(first.code, ReasonCode::SearchBudgetExceeded);
    assert_eq!(first.code, second.code);
    assert_eq!(first.message, second.message);
}

#[test]
fn coordinate_endpoints_snap_and_report_metadata() {
    let engine = build(diamond(), EngineConfig::default());
    let request = RouteRequest::new(
        AddressSlot::coordinate(0.1, 0.1),
        AddressSlot::external("D"),
        0,
    )
    .algorithm(Algorithm::Dijkstra)
    .allow_mixed(true)
    .coordinate_strategy("XY");
    let response = engine.router.route(&request).unwrap();
    assert!(response.reachable);
    assert_eq!(response.source.external_id, "A");
    let snap = response.source.snap.unwrap();
    assert!(snap.distance > 0.0 && snap.distance < 0.2);
}

#[test]
fn snap_threshold_monotonicity() {
    // the probe sits exactly 1 unit from D at (4, 0), its nearest node
    let probe = (5.0, 0.0);
    for (max_snap, expect_ok) in [(0.999, false), (1.0, true), (1.001, true)] {
        let engine = build(diamond(), EngineConfig::default());
        let request = RouteRequest::new(
            AddressSlot::external("A"),
            AddressSlot::coordinate(probe.0, probe.1),
            0,
        )
        .algorithm(Algorithm::Dijkstra)
        .allow_mixed(true)
        .coordinate_strategy("XY")
        .max_snap_distance(max_snap);
        let result = engine.router.route(&request);
        if expect_ok {
            assert_eq!(result.unwrap().target.external_id, "D");
        } else {
            assert_eq!(
                result.unwrap_err().code,
                ReasonCode::SnapThresholdExceeded
            );
        }
    }
}

#[test]
fn overlay_redirects_and_snapshot_stays_consistent() {
    use taro_engine::LiveUpdate;

    let engine = build(two_route_fixture(), EngineConfig::default());
    let request = dijkstra("A", "C", 0);
    assert_eq!(engine.router.route(&request).unwrap().total_cost, 2.0);

    // block the cheap middle hop; the direct edge wins
    let blocked_edge = engine.fixture.edge_between("A", "B");
    let outcome = engine
        .overlay
        .upsert(LiveUpdate::new(blocked_edge, 0.0, 1_000), 0);
    assert_eq!(outcome.accepted, 1);
    assert_eq!(engine.router.route(&request).unwrap().total_cost, 3.0);

    // after the override expires the detour returns
    let late = dijkstra("A", "C", 2_000);
    assert_eq!(engine.router.route(&late).unwrap().total_cost, 2.0);
}

/// `A -> C` direct at 3s, `A -> B -> C` at 1s + 1s.
fn two_route_fixture() -> taro_model::fixture::Fixture {
    taro_model::fixture::FixtureBuilder::new()
        .nodes(["A", "B", "C"])
        .edge("A", "C", 3.0)
        .edge("A", "B", 1.0)
        .edge("B", "C", 1.0)
        .build()
}
