//! Bidirectional time-dependent A*.
//!
//! The forward pass expands edge-based labels in time-forward direction.
//! Time-dependent costs are not reversible in general, so the backward pass
//! runs a plain lower-bound Dijkstra over nodes using the per-edge
//! time-independent bounds; its settled distances prune forward labels
//! against the current best goal.

use taro_common::{EdgeId, LabelId, NodeId, RouteError, Ticks, saturating_advance};
use taro_model::TurnTable;

use crate::cost::CostEngine;
use crate::heuristics::Heuristic;
use crate::overlay::OverlaySnapshot;
use crate::search::budget::SearchBudgets;
use crate::search::labels::{BwdItem, FwdItem, Label, QueryContext};
use crate::temporal::TemporalContext;
use crate::transition::TransitionTrait;

/// Termination slack on cost sums; well inside the fixture tolerance.
pub(crate) const TERMINATION_EPSILON: f64 = 1e-9;

/// Everything a single expansion needs, borrowed for the query's duration.
#[derive(Clone, Copy)]
pub struct SearchEnv<'a> {
    pub cost: &'a CostEngine,
    pub snapshot: &'a OverlaySnapshot,
    pub temporal: &'a TemporalContext,
    pub transition: TransitionTrait,
    pub turns: &'a TurnTable,
}

impl<'a> SearchEnv<'a> {
    #[inline]
    pub fn edge_cost(&self, edge: EdgeId, entry: Ticks) -> f64 {
        self.cost.edge_cost(self.snapshot, self.temporal, edge, entry)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome {
    pub reachable: bool,
    pub cost: f64,
    pub arrival: Ticks,
    pub edges: Vec<EdgeId>,
    pub settled: u64,
}

impl RouteOutcome {
    fn unreachable(departure: Ticks, settled: u64) -> Self {
        Self {
            reachable: false,
            cost: f64::INFINITY,
            arrival: departure,
            edges: Vec::new(),
            settled,
        }
    }
}

/// Goal-improvement tie-break: strictly better cost, or equal cost with a
/// strictly earlier arrival.
#[inline]
pub(crate) fn is_better(cost1: f64, arr1: Ticks, cost2: f64, arr2: Ticks) -> bool {
    cost1 < cost2 || (cost1 == cost2 && arr1 < arr2)
}

/// Like `is_better` but with `<=`: equality is tentatively improving until
/// the strict tie-break fails.
#[inline]
pub(crate) fn can_improve_goal(cost1: f64, arr1: Ticks, cost2: f64, arr2: Ticks) -> bool {
    cost1 < cost2 || (cost1 == cost2 && arr1 <= arr2)
}

struct Goal {
    cost: f64,
    arrival: Ticks,
    label: LabelId,
}

/// Plan one route. The context is reset on entry and owns all scratch.
pub fn plan_route(
    env: &SearchEnv<'_>,
    heuristic: &Heuristic,
    budgets: &SearchBudgets,
    ctx: &mut QueryContext,
    source: NodeId,
    target: NodeId,
    departure: Ticks,
) -> Result<RouteOutcome, RouteError> {
    ctx.reset();

    if source == target {
        return Ok(RouteOutcome {
            reachable: true,
            cost: 0.0,
            arrival: departure,
            edges: Vec::new(),
            settled: 0,
        });
    }

    let topology = env.cost.topology().clone();
    let mut best: Option<Goal> = None;
    let mut settled: u64 = 0;

    // seed forward: one label per passable outgoing edge of the source
    for edge in topology.out_edges(source) {
        let cost = env.edge_cost(edge, departure);
        if !cost.is_finite() {
            continue;
        }
        let arrival = env.cost.arrival_after(departure, cost);
        let label = Label {
            edge,
            cost,
            arrival,
            parent: LabelId::NONE,
        };
        let Some(id) = ctx.try_insert(label) else {
            continue;
        };
        budgets.check_labels(ctx.store.len() as u64)?;
        let node = topology.target(edge);
        let estimate = heuristic.estimate(node);
        if !estimate.is_finite() {
            continue;
        }
        ctx.fwd_frontier.push(FwdItem {
            priority: cost + estimate,
            cost,
            arrival,
            edge,
            label: id,
        });
        budgets.check_frontier(ctx.fwd_frontier.len() as u64)?;
        if node == target && best.as_ref().is_none_or(|g| is_better(cost, arrival, g.cost, g.arrival)) {
            best = Some(Goal {
                cost,
                arrival,
                label: id,
            });
        }
    }

    // seed backward at the target
    ctx.reverse_best.insert(target.0, 0.0);
    ctx.bwd_frontier.push(BwdItem {
        distance: 0.0,
        node: target,
    });

    loop {
        let Some(forward_min) = ctx.fwd_frontier.peek().map(|i| i.priority) else {
            break;
        };
        // Terminate on the forward bound alone. The sum-with-backward-min
        // variant can stop early while the backward frontier still holds a
        // distant node, because reverse distances are lower bounds and the
        // goal only improves at true target labels. Strictly-greater keeps
        // equal-cost labels expanding so arrival ties resolve.
        if let Some(goal) = &best
            && forward_min > goal.cost + TERMINATION_EPSILON
        {
            break;
        }

        forward_step(env, &topology, heuristic, budgets, ctx, target, &mut best, &mut settled)?;
        backward_step(env, &topology, budgets, ctx, &best, &mut settled)?;
    }

    let Some(goal) = best else {
        return Ok(RouteOutcome::unreachable(departure, settled));
    };

    // walk the parent chain; labels were appended root-first
    let mut edges = Vec::new();
    let mut cursor = goal.label;
    while !cursor.is_none() {
        let label = ctx.store.get(cursor);
        edges.push(label.edge);
        cursor = label.parent;
    }
    edges.reverse();

    Ok(RouteOutcome {
        reachable: true,
        cost: goal.cost,
        arrival: goal.arrival,
        edges,
        settled,
    })
}

fn forward_step(
    env: &SearchEnv<'_>,
    topology: &taro_model::GraphTopology,
    heuristic: &Heuristic,
    budgets: &SearchBudgets,
    ctx: &mut QueryContext,
    target: NodeId,
    best: &mut Option<Goal>,
    settled: &mut u64,
) -> Result<(), RouteError> {
    let Some(item) = ctx.fwd_frontier.pop() else {
        return Ok(());
    };
    // stale pops still count: work accounting is total
    *settled += 1;
    budgets.check_settled(*settled)?;
    if !ctx.is_current(item.edge, item.label) {
        return Ok(());
    }

    let node = topology.target(item.edge);
    // goal-improvement pruning against the backward pass's settled bound
    if let Some(goal) = best
        && ctx.bwd_settled.contains(&node.0)
        && let Some(&to_target) = ctx.reverse_best.get(&node.0)
        && item.cost + to_target > goal.cost + TERMINATION_EPSILON
    {
        return Ok(());
    }

    for successor in topology.out_edges(node) {
        let Some(penalty) = env.transition.turn_penalty(env.turns, item.edge, successor) else {
            continue;
        };
        let entry = if penalty > 0.0 {
            saturating_advance(item.arrival, env.cost.seconds_to_ticks(penalty))
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

        let next_node = topology.target(successor);
        let estimate = heuristic.estimate(next_node);
        if !estimate.is_finite() {
            continue;
        }
        let priority = next_cost + estimate;
        if let Some(goal) = best
            && !can_improve_goal(priority, next_arrival, goal.cost, goal.arrival)
        {
            continue;
        }

        let Some(child) = ctx.try_insert(Label {
            edge: successor,
            cost: next_cost,
            arrival: next_arrival,
            parent: item.label,
        }) else {
            continue;
        };
        budgets.check_labels(ctx.store.len() as u64)?;
        ctx.fwd_frontier.push(FwdItem {
            priority,
            cost: next_cost,
            arrival: next_arrival,
            edge: successor,
            label: child,
        });
        budgets.check_frontier(ctx.fwd_frontier.len() as u64)?;

        if next_node == target
            && best
                .as_ref()
                .is_none_or(|g| is_better(next_cost, next_arrival, g.cost, g.arrival))
        {
            *best = Some(Goal {
                cost: next_cost,
                arrival: next_arrival,
                label: child,
            });
        }
    }
    Ok(())
}

fn backward_step(
    env: &SearchEnv<'_>,
    topology: &taro_model::GraphTopology,
    budgets: &SearchBudgets,
    ctx: &mut QueryContext,
    best: &Option<Goal>,
    settled: &mut u64,
) -> Result<(), RouteError> {
    let Some(item) = ctx.bwd_frontier.pop() else {
        return Ok(());
    };
    *settled += 1;
    budgets.check_settled(*settled)?;
    if !ctx.bwd_settled.insert(item.node.0) {
        return Ok(());
    }
    // beyond the best goal the lower bound cannot prune anything new
    if let Some(goal) = best
        && item.distance > goal.cost + TERMINATION_EPSILON
    {
        return Ok(());
    }

    for &edge in topology.in_edges(item.node) {
        let bound = env.cost.lower_bound(edge);
        if !bound.is_finite() {
            continue;
        }
        let origin = topology.origin(edge);
        let next = item.distance + bound;
        let current = ctx
            .reverse_best
            .get(&origin.0)
            .copied()
            .unwrap_or(f64::INFINITY);
        if next < current {
            ctx.reverse_best.insert(origin.0, next);
            ctx.bwd_frontier.push(BwdItem {
                distance: next,
                node: origin,
            });
        }
    }
    Ok(())
}
