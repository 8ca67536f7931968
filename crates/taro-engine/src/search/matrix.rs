//! One-to-many rows and the matrix planners.
//!
//! DIJKSTRA runs one native multi-target row per unique source. A_STAR runs
//! a native row with a min-over-targets heuristic while the target set is
//! small, and falls back to per-cell route planning beyond the configured
//! threshold. Duplicate request rows and columns reuse the computed cells.

use rustc_hash::FxHashMap;
use taro_common::{LabelId, NodeId, RouteError, Ticks};

use crate::heuristics::{Heuristic, HeuristicType};
use crate::search::astar::{SearchEnv, plan_route};
use crate::search::budget::{BudgetConfig, RequestWork, SearchBudgets};
use crate::search::labels::{FwdItem, Label, QueryContext};

/// One source-target cell. Unreachable cells carry the `+inf` cost sentinel
/// and echo the departure instant as their arrival.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixCell {
    pub reachable: bool,
    pub cost: f64,
    pub arrival: Ticks,
}

impl MatrixCell {
    fn unreachable(departure: Ticks) -> Self {
        Self {
            reachable: false,
            cost: f64::INFINITY,
            arrival: departure,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixOutcome {
    /// Row-major, `sources.len() x targets.len()`, in request order.
    pub cells: Vec<MatrixCell>,
    pub implementation_note: &'static str,
    pub settled: u64,
}

pub(crate) const NOTE_NATIVE_DIJKSTRA: &str = "native-dijkstra";
pub(crate) const NOTE_NATIVE_A_STAR: &str = "native-a-star";
pub(crate) const NOTE_BATCHED_A_STAR: &str = "batched-a-star-compatibility";
pub(crate) const NOTE_PAIRWISE: &str = "pairwise-compatibility";

pub struct MatrixParams<'a> {
    pub env: &'a SearchEnv<'a>,
    pub heuristic_kind: HeuristicType,
    pub landmarks: Option<&'a std::sync::Arc<taro_model::LandmarkArtifact>>,
    pub budget_config: &'a BudgetConfig,
    /// Largest unique-target set the native A* row planner serves.
    pub native_astar_target_limit: usize,
}

/// Plan a full matrix. `dijkstra` selects the native multi-target row
/// planner; otherwise the A* paths apply.
pub fn plan_matrix(
    params: &MatrixParams<'_>,
    ctx: &mut QueryContext,
    sources: &[NodeId],
    targets: &[NodeId],
    departure: Ticks,
    dijkstra: bool,
) -> Result<MatrixOutcome, RouteError> {
    let unique_sources = dedup(sources);
    let unique_targets = dedup(targets);

    let mut request_work = RequestWork::new(params.budget_config);
    let row_budgets = SearchBudgets::per_row(params.budget_config);

    let note;
    // unique-cell grid, later fanned out to the duplicated request shape
    let mut grid: Vec<MatrixCell> =
        Vec::with_capacity(unique_sources.order.len() * unique_targets.order.len());

    if dijkstra {
        note = NOTE_NATIVE_DIJKSTRA;
        for &source in &unique_sources.order {
            let row = one_to_many_row(
                params.env,
                &Heuristic::None,
                &row_budgets,
                &mut request_work,
                ctx,
                source,
                &unique_targets.order,
                departure,
            )?;
            grid.extend(row);
        }
    } else if sources.len() == 1 && targets.len() == 1 {
        note = NOTE_PAIRWISE;
        let cell = route_cell(
            params,
            &row_budgets,
            &mut request_work,
            ctx,
            unique_sources.order[0],
            unique_targets.order[0],
            departure,
        )?;
        grid.push(cell);
    } else if unique_targets.order.len() <= params.native_astar_target_limit {
        note = NOTE_NATIVE_A_STAR;
        let per_target: Vec<Heuristic> = unique_targets
            .order
            .iter()
            .map(|&t| Heuristic::build(params.heuristic_kind, t, params.env.cost, params.landmarks))
            .collect::<Result<_, _>>()?;
        for &source in &unique_sources.order {
            let heuristic = MultiTargetHeuristic(&per_target);
            let row = one_to_many_row_with(
                params.env,
                |node| heuristic.estimate(node),
                &row_budgets,
                &mut request_work,
                ctx,
                source,
                &unique_targets.order,
                departure,
            )?;
            grid.extend(row);
        }
    } else {
        note = NOTE_BATCHED_A_STAR;
        for &source in &unique_sources.order {
            for &target in &unique_targets.order {
                let cell = route_cell(
                    params,
                    &row_budgets,
                    &mut request_work,
                    ctx,
                    source,
                    target,
                    departure,
                )?;
                grid.push(cell);
            }
        }
    }

    // fan the unique grid back out to the request's duplicated shape
    let cols = unique_targets.order.len();
    let mut cells = Vec::with_capacity(sources.len() * targets.len());
    for &s in sources {
        let row = unique_sources.index_of[&s.0];
        for &t in targets {
            let col = unique_targets.index_of[&t.0];
            cells.push(grid[row * cols + col]);
        }
    }

    Ok(MatrixOutcome {
        cells,
        implementation_note: note,
        settled: request_work.used(),
    })
}

struct Deduped {
    order: Vec<NodeId>,
    index_of: FxHashMap<u32, usize>,
}

fn dedup(nodes: &[NodeId]) -> Deduped {
    let mut order = Vec::new();
    let mut index_of = FxHashMap::default();
    for &n in nodes {
        index_of.entry(n.0).or_insert_with(|| {
            order.push(n);
            order.len() - 1
        });
    }
    Deduped { order, index_of }
}

struct MultiTargetHeuristic<'a>(&'a [Heuristic]);

impl MultiTargetHeuristic<'_> {
    /// Admissible for every target: the minimum of the per-target bounds.
    fn estimate(&self, node: NodeId) -> f64 {
        self.0
            .iter()
            .map(|h| h.estimate(node))
            .fold(f64::INFINITY, f64::min)
    }
}

fn one_to_many_row(
    env: &SearchEnv<'_>,
    heuristic: &Heuristic,
    budgets: &SearchBudgets,
    request_work: &mut RequestWork,
    ctx: &mut QueryContext,
    source: NodeId,
    targets: &[NodeId],
    departure: Ticks,
) -> Result<Vec<MatrixCell>, RouteError> {
    one_to_many_row_with(
        env,
        |node| heuristic.estimate(node),
        budgets,
        request_work,
        ctx,
        source,
        targets,
        departure,
    )
}

/// One forward search that records best cost and arrival at every unique
/// target; terminates when all targets settle or the frontier drains.
fn one_to_many_row_with(
    env: &SearchEnv<'_>,
    estimate: impl Fn(NodeId) -> f64,
    budgets: &SearchBudgets,
    request_work: &mut RequestWork,
    ctx: &mut QueryContext,
    source: NodeId,
    targets: &[NodeId],
    departure: Ticks,
) -> Result<Vec<MatrixCell>, RouteError> {
    ctx.reset();
    let topology = env.cost.topology().clone();

    let mut cell_of: FxHashMap<u32, usize> = FxHashMap::default();
    for (i, t) in targets.iter().enumerate() {
        cell_of.insert(t.0, i);
    }
    let mut cells = vec![MatrixCell::unreachable(departure); targets.len()];
    let mut remaining = targets.len();

    // the source node itself is reached before any edge
    if let Some(&i) = cell_of.get(&source.0) {
        cells[i] = MatrixCell {
            reachable: true,
            cost: 0.0,
            arrival: departure,
        };
        remaining -= 1;
    }

    let mut settled: u64 = 0;
    let settle =
        |cells: &mut Vec<MatrixCell>, remaining: &mut usize, node: NodeId, cost: f64, arrival: Ticks| {
            if let Some(&i) = cell_of.get(&node.0)
                && !cells[i].reachable
            {
                cells[i] = MatrixCell {
                    reachable: true,
                    cost,
                    arrival,
                };
                *remaining -= 1;
            }
        };

    // seed
    for edge in topology.out_edges(source) {
        let cost = env.edge_cost(edge, departure);
        if !cost.is_finite() {
            continue;
        }
        let arrival = env.cost.arrival_after(departure, cost);
        let Some(id) = ctx.try_insert(Label {
            edge,
            cost,
            arrival,
            parent: LabelId::NONE,
        }) else {
            continue;
        };
        budgets.check_labels(ctx.store.len() as u64)?;
        let h = estimate(topology.target(edge));
        if !h.is_finite() {
            continue;
        }
        ctx.fwd_frontier.push(FwdItem {
            priority: cost + h,
            cost,
            arrival,
            edge,
            label: id,
        });
        budgets.check_frontier(ctx.fwd_frontier.len() as u64)?;
    }

    while remaining > 0 {
        let Some(item) = ctx.fwd_frontier.pop() else {
            break;
        };
        settled += 1;
        budgets.check_settled(settled)?;
        request_work.add(1)?;
        if !ctx.is_current(item.edge, item.label) {
            continue;
        }

        let node = topology.target(item.edge);
        // first pop at a node carries its minimal (cost, arrival) pair
        settle(&mut cells, &mut remaining, node, item.cost, item.arrival);
        if remaining == 0 {
            break;
        }

        for successor in topology.out_edges(node) {
            let Some(penalty) = env.transition.turn_penalty(env.turns, item.edge, successor)
            else {
                continue;
            };
            let entry = if penalty > 0.0 {
                taro_common::saturating_advance(item.arrival, env.cost.seconds_to_ticks(penalty))
            } else {
                item.arrival
            };
            let edge_cost = env.edge_cost(successor, entry);
            if !edge_cost.is_finite() {
                continue;
            }
            let next_cost = item.cost + penalty + edge_cost;
            if !next_cost.is_finite() {
                continue;
            }
            let next_arrival = env.cost.arrival_after(entry, edge_cost);
            let Some(child) = ctx.try_insert(Label {
                edge: successor,
                cost: next_cost,
                arrival: next_arrival,
                parent: item.label,
            }) else {
                continue;
            };
            budgets.check_labels(ctx.store.len() as u64)?;
            let h = estimate(topology.target(successor));
            if !h.is_finite() {
                continue;
            }
            ctx.fwd_frontier.push(FwdItem {
                priority: next_cost + h,
                cost: next_cost,
                arrival: next_arrival,
                edge: successor,
                label: child,
            });
            budgets.check_frontier(ctx.fwd_frontier.len() as u64)?;
        }
    }

    Ok(cells)
}

fn route_cell(
    params: &MatrixParams<'_>,
    budgets: &SearchBudgets,
    request_work: &mut RequestWork,
    ctx: &mut QueryContext,
    source: NodeId,
    target: NodeId,
    departure: Ticks,
) -> Result<MatrixCell, RouteError> {
    let heuristic = Heuristic::build(
        params.heuristic_kind,
        target,
        params.env.cost,
        params.landmarks,
    )?;
    let outcome = plan_route(params.env, &heuristic, budgets, ctx, source, target, departure)?;
    request_work.add(outcome.settled)?;
    Ok(MatrixCell {
        reachable: outcome.reachable,
        cost: outcome.cost,
        arrival: outcome.arrival,
    })
}
