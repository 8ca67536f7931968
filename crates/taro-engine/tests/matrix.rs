mod common;

use common::{build, chain5, diamond, disconnected};
use taro_common::ReasonCode;
use taro_engine::{
    AddressSlot, Algorithm, BudgetConfig, EngineConfig, HeuristicType, MatrixRequest,
    RouteRequest,
};

fn slots(names: &[&str]) -> Vec<AddressSlot> {
    names.iter().map(|n| AddressSlot::external(*n)).collect()
}

fn dijkstra_matrix(sources: &[&str], targets: &[&str], departure: i64) -> MatrixRequest {
    MatrixRequest::new(slots(sources), slots(targets), departure).algorithm(Algorithm::Dijkstra)
}

#[test]
fn chain_matrix() {
    let engine = build(chain5(), EngineConfig::default());
    let response = engine
        .router
        .matrix(&dijkstra_matrix(&["N0", "N1"], &["N3", "N4"], 5))
        .unwrap();
    assert_eq!((response.rows, response.cols), (2, 2));
    assert_eq!(response.implementation_note, "native-dijkstra");
    let costs: Vec<f64> = response.cells.iter().map(|c| c.cost).collect();
    assert_eq!(costs, vec![3.0, 4.0, 2.0, 3.0]);
}

#[test]
fn disconnected_matrix_with_duplicate_target() {
    let engine = build(disconnected(), EngineConfig::default());
    let response = engine
        .router
        .matrix(&dijkstra_matrix(&["N0"], &["N1", "N3", "N3"], 7))
        .unwrap();
    let reachable: Vec<bool> = response.cells.iter().map(|c| c.reachable).collect();
    assert_eq!(reachable, vec![true, false, false]);
    let costs: Vec<f64> = response.cells.iter().map(|c| c.cost).collect();
    assert_eq!(costs[0], 1.0);
    assert!(costs[1].is_infinite());
    let arrivals: Vec<i64> = response.cells.iter().map(|c| c.arrival).collect();
    assert_eq!(arrivals, vec![8, 7, 7]);
    assert_eq!(response.cells[1], response.cells[2]);
}

#[test]
fn matrix_rows_cohere_with_route() {
    let engine = build(chain5(), EngineConfig::default());
    let names = ["N0", "N1", "N2", "N3", "N4"];
    let response = engine
        .router
        .matrix(&dijkstra_matrix(&names, &names, 11))
        .unwrap();
    for (r, source) in names.iter().enumerate() {
        for (c, target) in names.iter().enumerate() {
            let route = engine
                .router
                .route(
                    &RouteRequest::new(
                        AddressSlot::external(*source),
                        AddressSlot::external(*target),
                        11,
                    )
                    .algorithm(Algorithm::Dijkstra),
                )
                .unwrap();
            let cell = response.cell(r, c);
            assert_eq!(cell.reachable, route.reachable, "{source}->{target}");
            assert_eq!(cell.cost, route.total_cost, "{source}->{target}");
            assert_eq!(cell.arrival, route.arrival_ticks, "{source}->{target}");
        }
    }
}

#[test]
fn duplicate_rows_are_byte_equal() {
    let engine = build(chain5(), EngineConfig::default());
    let response = engine
        .router
        .matrix(&dijkstra_matrix(&["N0", "N0", "N1"], &["N4"], 0))
        .unwrap();
    assert_eq!(response.cells[0], response.cells[1]);
    assert_ne!(response.cells[0], response.cells[2]);
}

#[test]
fn matrix_addressing_dedups_endpoints() {
    let engine = build(chain5(), EngineConfig::default());
    let response = engine
        .router
        .matrix(&dijkstra_matrix(&["N0", "N0"], &["N4", "N4", "N0"], 0))
        .unwrap();
    // five addresses, two unique
    assert_eq!(response.addressing.endpoints, 5);
    assert_eq!(response.addressing.unique, 2);
    assert_eq!(response.addressing.resolve_calls, 2);
    assert_eq!(response.addressing.dedup_saved, 3);
}

#[test]
fn a_star_matrix_selects_planners_by_scale() {
    let engine = build(chain5(), EngineConfig::default());

    let pairwise = MatrixRequest::new(slots(&["N0"]), slots(&["N4"]), 0)
        .algorithm(Algorithm::AStar)
        .heuristic(HeuristicType::None);
    let response = engine.router.matrix(&pairwise).unwrap();
    assert_eq!(response.implementation_note, "pairwise-compatibility");
    assert_eq!(response.cells[0].cost, 4.0);

    let native = MatrixRequest::new(slots(&["N0", "N1"]), slots(&["N3", "N4"]), 0)
        .algorithm(Algorithm::AStar)
        .heuristic(HeuristicType::None);
    let response = engine.router.matrix(&native).unwrap();
    assert_eq!(response.implementation_note, "native-a-star");
    let costs: Vec<f64> = response.cells.iter().map(|c| c.cost).collect();
    assert_eq!(costs, vec![3.0, 4.0, 2.0, 3.0]);

    let config = EngineConfig {
        native_astar_target_limit: 1,
        ..Default::default()
    };
    let engine = build(chain5(), config);
    let batched = MatrixRequest::new(slots(&["N0"]), slots(&["N3", "N4"]), 0)
        .algorithm(Algorithm::AStar)
        .heuristic(HeuristicType::None);
    let response = engine.router.matrix(&batched).unwrap();
    assert_eq!(response.implementation_note, "batched-a-star-compatibility");
    let costs: Vec<f64> = response.cells.iter().map(|c| c.cost).collect();
    assert_eq!(costs, vec![3.0, 4.0]);
}

#[test]
fn euclidean_a_star_matrix_matches_dijkstra_on_both_paths() {
    // multi-target rows take the min over per-target bounds; parity with
    // Dijkstra checks that combinator stays admissible
    let engine = build(diamond(), EngineConfig::default());
    let baseline = engine
        .router
        .matrix(&dijkstra_matrix(&["A", "B"], &["B", "D"], 9))
        .unwrap();
    let costs: Vec<f64> = baseline.cells.iter().map(|c| c.cost).collect();
    assert_eq!(costs, vec![2.0, 4.0, 0.0, 2.0]);

    let native = engine
        .router
        .matrix(
            &MatrixRequest::new(slots(&["A", "B"]), slots(&["B", "D"]), 9)
                .algorithm(Algorithm::AStar)
                .heuristic(HeuristicType::Euclidean),
        )
        .unwrap();
    assert_eq!(native.implementation_note, "native-a-star");
    assert_eq!(native.cells, baseline.cells);

    let config = EngineConfig {
        native_astar_target_limit: 1,
        ..Default::default()
    };
    let engine = build(diamond(), config);
    let batched = engine
        .router
        .matrix(
            &MatrixRequest::new(slots(&["A", "B"]), slots(&["B", "D"]), 9)
                .algorithm(Algorithm::AStar)
                .heuristic(HeuristicType::Euclidean),
        )
        .unwrap();
    assert_eq!(batched.implementation_note, "batched-a-star-compatibility");
    assert_eq!(batched.cells, baseline.cells);
}

#[test]
fn dijkstra_and_a_star_matrices_agree() {
    let engine = build(chain5(), EngineConfig::default());
    let d = engine
        .router
        .matrix(&dijkstra_matrix(&["N0", "N2"], &["N1", "N4"], 3))
        .unwrap();
    let a = engine
        .router
        .matrix(
            &MatrixRequest::new(slots(&["N0", "N2"]), slots(&["N1", "N4"]), 3)
                .algorithm(Algorithm::AStar)
                .heuristic(HeuristicType::None),
        )
        .unwrap();
    assert_eq!(d.cells, a.cells);
}

#[test]
fn empty_lists_are_rejected() {
    let engine = build(chain5(), EngineConfig::default());
    let err = engine
        .router
        .matrix(&MatrixRequest::new(vec![], slots(&["N4"]), 0).algorithm(Algorithm::Dijkstra))
        .unwrap_err();
    assert_eq!(err.code, ReasonCode::SourcesRequired);
    let err = engine
        .router
        .matrix(&MatrixRequest::new(slots(&["N0"]), vec![], 0).algorithm(Algorithm::Dijkstra))
        .unwrap_err();
    assert_eq!(err.code, ReasonCode::TargetsRequired);
}

#[test]
fn request_budget_fails_the_whole_matrix_deterministically() {
    let config = EngineConfig {
        budgets: BudgetConfig {
            request_work: 3,
            ..Default::default()
        },
        ..Default::default()
    };
    let engine = build(chain5(), config);
    let request = dijkstra_matrix(&["N0", "N1", "N2"], &["N4"], 0);
    let first = engine.router.matrix(&request).unwrap_err();
    let second = engine.router.matrix(&request).unwrap_err();
    assert_eq!(first.code, ReasonCode::MatrixSearchBudgetExceeded);
    assert_eq!(first.code, second.code);
}

#[test]
fn unreachable_cells_do_not_fail_the_request() {
    let engine = build(disconnected(), EngineConfig::default());
    let response = engine
        .router
        .matrix(&dijkstra_matrix(&["N0", "N2"], &["N1", "N3"], 0))
        .unwrap();
    // partial success: N0 reaches N1 only, N2 reaches N3 only
    assert!(response.cell(0, 0).reachable);
    assert!(!response.cell(0, 1).reachable);
    assert!(!response.cell(1, 0).reachable);
    assert!(response.cell(1, 1).reachable);
}
