//! Deterministic path replay.
//!
//! Replays an edge path through the cost engine and transition policy,
//! verifying the planner's totals and reconstructing the node sequence. A
//! broken edge chain is a programming fault, not an input error; it still
//! surfaces as a typed failure rather than a panic.

use taro_common::{EdgeId, NodeId, ReasonCode, RouteError, Ticks, saturating_advance};

use crate::search::astar::SearchEnv;

#[derive(Debug, Clone, PartialEq)]
pub struct PathEvaluation {
    pub cost: f64,
    pub arrival: Ticks,
    /// Node sequence including both endpoints; empty for an empty path.
    pub nodes: Vec<NodeId>,
}

pub fn evaluate_path(
    env: &SearchEnv<'_>,
    edges: &[EdgeId],
    departure: Ticks,
) -> Result<PathEvaluation, RouteError> {
    let topology = env.cost.topology();

    let mut nodes = Vec::with_capacity(edges.len() + 1);
    let mut cost = 0.0f64;
    let mut clock = departure;
    let mut previous: Option<EdgeId> = None;

    for &edge in edges {
        let origin = topology.origin(edge);
        match previous {
            None => {
                nodes.push(origin);
            }
            Some(prev) if topology.target(prev) == origin => {}
            Some(prev) => {
                return Err(RouteError::new(ReasonCode::NodePathReconstruction).with_message(
                    format!(
                        "edge {edge:?} starts at {origin:?} but {prev:?} ends at {:?}",
                        topology.target(prev)
                    ),
                ));
            }
        }

        let penalty = match previous {
            Some(prev) => env
                .transition
                .turn_penalty(env.turns, prev, edge)
                .unwrap_or(f64::INFINITY),
            None => 0.0,
        };
        if penalty > 0.0 {
            clock = saturating_advance(clock, env.cost.seconds_to_ticks(penalty));
        }

        let step = if penalty.is_finite() {
            env.edge_cost(edge, clock)
        } else {
            f64::INFINITY
        };
        if !step.is_finite() {
            return Err(RouteError::new(ReasonCode::NonFiniteEdgeCost)
                .with_message(format!("edge {edge:?} at t={clock} costs {step}")));
        }

        cost += penalty + step;
        if !cost.is_finite() {
            return Err(RouteError::new(ReasonCode::NonFinitePathCost)
                .with_message(format!("cumulative cost overflowed at edge {edge:?}")));
        }
        clock = env.cost.arrival_after(clock, step);
        nodes.push(topology.target(edge));
        previous = Some(edge);
    }

    Ok(PathEvaluation {
        cost,
        arrival: clock,
        nodes,
    })
}
