//! Admissible lower-bound providers for the forward search.
//!
//! Geometric providers calibrate a model-wide maximum velocity at
//! construction (straight-line distance per lower-bound second over all
//! edges); dividing by it keeps the estimate admissible. Landmark bounds
//! come straight from the precomputed artifact.

use std::sync::Arc;

use taro_common::{EdgeId, NodeId, ReasonCode, RouteError};
use taro_model::{Coordinate, GraphTopology, LandmarkArtifact};

use crate::cost::CostEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeuristicType {
    #[default]
    None,
    Euclidean,
    Spherical,
    Landmark,
}

impl HeuristicType {
    pub fn from_id(id: &str) -> Result<Self, RouteError> {
        match id {
            "NONE" => Ok(HeuristicType::None),
            "EUCLIDEAN" => Ok(HeuristicType::Euclidean),
            "SPHERICAL" => Ok(HeuristicType::Spherical),
            "LANDMARK" => Ok(HeuristicType::Landmark),
            other => Err(RouteError::new(ReasonCode::HeuristicConfigurationFailed)
                .with_message(format!("unknown heuristic '{other}'"))),
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            HeuristicType::None => "NONE",
            HeuristicType::Euclidean => "EUCLIDEAN",
            HeuristicType::Spherical => "SPHERICAL",
            HeuristicType::Landmark => "LANDMARK",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Heuristic {
    None,
    Geometric {
        topology: Arc<GraphTopology>,
        target: Coordinate,
        inv_velocity: f64,
        spherical: bool,
    },
    Landmark {
        artifact: Arc<LandmarkArtifact>,
        target: NodeId,
    },
}

impl Heuristic {
    /// Build the provider for one query target.
    ///
    /// Degrades to the zero heuristic when the model cannot support the
    /// requested kind (no coordinates, or no calibratable edge). A LANDMARK
    /// request without an artifact is a configuration failure.
    pub fn build(
        kind: HeuristicType,
        target: NodeId,
        engine: &CostEngine,
        landmarks: Option<&Arc<LandmarkArtifact>>,
    ) -> Result<Self, RouteError> {
        match kind {
            HeuristicType::None => Ok(Heuristic::None),
            HeuristicType::Euclidean | HeuristicType::Spherical => {
                let spherical = kind == HeuristicType::Spherical;
                let topology = engine.topology().clone();
                let Some(target_coord) = topology.coordinate(target).filter(finite_coord) else {
                    return Ok(Heuristic::None);
                };
                match calibrate_velocity(&topology, engine, spherical) {
                    Some(velocity) => Ok(Heuristic::Geometric {
                        topology,
                        target: target_coord,
                        inv_velocity: 1.0 / velocity,
                        spherical,
                    }),
                    None => Ok(Heuristic::None),
                }
            }
            HeuristicType::Landmark => {
                let artifact = landmarks.ok_or_else(|| {
                    RouteError::new(ReasonCode::HeuristicConfigurationFailed)
                        .with_message("LANDMARK heuristic requested but no landmark artifact bound")
                })?;
                Ok(Heuristic::Landmark {
                    artifact: artifact.clone(),
                    target,
                })
            }
        }
    }

    /// Lower bound on the remaining cost from `node` to the target, in
    /// seconds. Negative or NaN estimates clamp to 0; `+inf` propagates and
    /// marks the node unreachable through this bound.
    pub fn estimate(&self, node: NodeId) -> f64 {
        let raw = match self {
            Heuristic::None => 0.0,
            Heuristic::Geometric {
                topology,
                target,
                inv_velocity,
                spherical,
            } => match topology.coordinate(node).filter(finite_coord) {
                Some(c) => distance(c, *target, *spherical) * inv_velocity,
                None => 0.0,
            },
            Heuristic::Landmark { artifact, target } => artifact.lower_bound(node, *target),
        };
        if raw.is_nan() || raw < 0.0 { 0.0 } else { raw }
    }
}

fn finite_coord(c: &Coordinate) -> bool {
    c.x.is_finite() && c.y.is_finite()
}

#[inline]
fn distance(a: Coordinate, b: Coordinate, spherical: bool) -> f64 {
    if spherical {
        haversine_meters(a, b)
    } else {
        ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
    }
}

/// Great-circle distance in meters; coordinates are (latitude, longitude)
/// degrees.
pub(crate) fn haversine_meters(a: Coordinate, b: Coordinate) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let (lat1, lon1) = (a.x.to_radians(), a.y.to_radians());
    let (lat2, lon2) = (b.x.to_radians(), b.y.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Fastest straight-line speed any edge permits under its lower-bound cost.
fn calibrate_velocity(
    topology: &GraphTopology,
    engine: &CostEngine,
    spherical: bool,
) -> Option<f64> {
    if !topology.has_coordinates() {
        return None;
    }
    let mut max_velocity = 0.0f64;
    for e in 0..topology.edge_count() {
        let edge = EdgeId(e as u32);
        let lb = engine.lower_bound(edge);
        if !(lb.is_finite() && lb > 0.0) {
            continue;
        }
        let (Some(from), Some(to)) = (
            topology.coordinate(topology.origin(edge)).filter(finite_coord),
            topology.coordinate(topology.target(edge)).filter(finite_coord),
        ) else {
            continue;
        };
        let v = distance(from, to, spherical) / lb;
        if v.is_finite() && v > max_velocity {
            max_velocity = v;
        }
    }
    (max_velocity > 0.0).then_some(max_velocity)
}
