//! Top-level orchestration: request validation, runtime binding, planner
//! dispatch, path verification, and response assembly.

use std::cell::RefCell;
use std::sync::Arc;

use taro_common::{NodeId, ReasonCode, RouteError};
use taro_model::{
    GraphTopology, IdMapper, KdTree, LandmarkArtifact, ModelMetadata, ProfileStore, TurnTable,
};
use tracing::debug;

use crate::addressing::{AddressSlot, AddressingEngine, AddressingOptions};
use crate::config::EngineConfig;
use crate::cost::CostEngine;
use crate::heuristics::{Heuristic, HeuristicType};
use crate::request::{Algorithm, MatrixRequest, MatrixResponse, RouteRequest, RouteResponse};
use crate::search::astar::{SearchEnv, plan_route};
use crate::search::budget::{BudgetConfig, SearchBudgets};
use crate::search::evaluator::evaluate_path;
use crate::search::labels::QueryContext;
use crate::search::matrix::{MatrixParams, plan_matrix};
use crate::telemetry::EngineMetrics;
use crate::temporal::{TemporalContext, TemporalTrait, TimezonePolicy};
use crate::transition::TransitionTrait;

thread_local! {
    // one reusable scratch context per worker thread
    static QUERY_CTX: RefCell<QueryContext> = RefCell::new(QueryContext::new());
}

const NOTE_BIDIRECTIONAL_DIJKSTRA: &str = "bidirectional-dijkstra";
const NOTE_BIDIRECTIONAL_A_STAR: &str = "bidirectional-a-star";

#[derive(Debug)]
pub struct Router {
    cost_engine: Arc<CostEngine>,
    turns: Arc<TurnTable>,
    mapper: Arc<IdMapper>,
    landmarks: Option<Arc<LandmarkArtifact>>,
    addressing: AddressingEngine,
    temporal: TemporalContext,
    transition: TransitionTrait,
    budgets: BudgetConfig,
    native_astar_target_limit: usize,
    metrics: EngineMetrics,
}

impl Router {
    /// Bind the runtime. The cost engine must reference the exact topology
    /// and profile store passed here; on targets where the `Arc`s were
    /// rebuilt, structural fingerprints stand in for pointer identity.
    pub fn new(
        cost_engine: Arc<CostEngine>,
        topology: Arc<GraphTopology>,
        profiles: Arc<ProfileStore>,
        turns: Arc<TurnTable>,
        mapper: Arc<IdMapper>,
        spatial: Option<Arc<KdTree>>,
        landmarks: Option<Arc<LandmarkArtifact>>,
        metadata: &ModelMetadata,
        config: EngineConfig,
    ) -> Result<Self, RouteError> {
        if !Arc::ptr_eq(cost_engine.topology(), &topology)
            && cost_engine.topology().fingerprint() != topology.fingerprint()
        {
            return Err(RouteError::new(ReasonCode::CostEngineGraphMismatch)
                .with_message("cost engine was built against a different topology"));
        }
        if !Arc::ptr_eq(cost_engine.profiles(), &profiles)
            && cost_engine.profiles().fingerprint() != profiles.fingerprint()
        {
            return Err(RouteError::new(ReasonCode::CostEngineProfileMismatch)
                .with_message("cost engine was built against a different profile store"));
        }
        if let Some(artifact) = &landmarks {
            let expected = (topology.fingerprint(), profiles.fingerprint());
            if artifact.signature() != expected {
                return Err(RouteError::new(ReasonCode::HeuristicConfigurationFailed)
                    .with_message("landmark artifact signature does not match graph and profiles"));
            }
        }

        let transition = match &config.transition.trait_id {
            None => TransitionTrait::EdgeBased,
            Some(id) if id.is_empty() => {
                return Err(RouteError::new(ReasonCode::TransitionConfigRequired)
                    .with_message("transition trait id is empty"));
            }
            Some(id) => TransitionTrait::from_id(id)?,
        };

        let ticks_per_second = metadata.time_unit.ticks_per_second() as i64;
        let temporal = match TemporalTrait::from_id(&config.temporal.trait_id)? {
            TemporalTrait::Linear => TemporalContext::linear(ticks_per_second),
            TemporalTrait::Calendar => {
                let zone = match &config.temporal.timezone_policy {
                    TimezonePolicy::Utc => "UTC",
                    TimezonePolicy::ModelTimezone => config
                        .temporal
                        .zone_id
                        .as_deref()
                        .unwrap_or(&metadata.profile_timezone),
                };
                TemporalContext::calendar(ticks_per_second, zone)?
            }
        };

        let addressing = AddressingEngine::new(
            &config.addressing.trait_id,
            mapper.clone(),
            topology.clone(),
            spatial,
            config.snap_cache.capacity,
            config.snap_cache.segments,
        )?;

        debug!(
            nodes = topology.node_count(),
            edges = topology.edge_count(),
            transition = transition.id(),
            temporal = temporal.trait_kind().id(),
            "router bound"
        );

        Ok(Self {
            cost_engine,
            turns,
            mapper,
            landmarks,
            addressing,
            temporal,
            transition,
            budgets: config.budgets,
            native_astar_target_limit: config.effective_native_astar_target_limit(),
            metrics: EngineMetrics::new(),
        })
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn addressing(&self) -> &AddressingEngine {
        &self.addressing
    }

    pub fn route(&self, request: &RouteRequest) -> Result<RouteResponse, RouteError> {
        self.metrics.add(&self.metrics.route_queries, 1);
        self.route_inner(request).inspect_err(|err| {
            self.metrics.add(&self.metrics.failed_queries, 1);
            debug!(code = err.code.as_str(), "route query failed");
        })
    }

    pub fn matrix(&self, request: &MatrixRequest) -> Result<MatrixResponse, RouteError> {
        self.metrics.add(&self.metrics.matrix_queries, 1);
        self.matrix_inner(request).inspect_err(|err| {
            self.metrics.add(&self.metrics.failed_queries, 1);
            debug!(code = err.code.as_str(), "matrix query failed");
        })
    }

    fn route_inner(&self, request: &RouteRequest) -> Result<RouteResponse, RouteError> {
        let algorithm = request
            .algorithm
            .ok_or_else(|| RouteError::new(ReasonCode::AlgorithmRequired))?;
        let heuristic_kind = self.validated_heuristic(algorithm, request.heuristic)?;

        if request.source.is_empty() {
            return Err(RouteError::new(ReasonCode::SourceRequired));
        }
        if request.target.is_empty() {
            return Err(RouteError::new(ReasonCode::TargetRequired));
        }

        let opts = AddressingOptions {
            allow_mixed: request.allow_mixed,
            trait_id: request.addressing_trait_id.as_deref(),
            strategy_id: request.coordinate_strategy_id.as_deref(),
            max_snap_distance: request.max_snap_distance,
        };
        let (mut resolved, stats) = self
            .addressing
            .resolve_request(&[&request.source, &request.target], &opts)?;
        self.record_addressing(&stats);
        let target_addr = resolved.pop().ok_or_else(internal_resolution_gap)?;
        let source_addr = resolved.pop().ok_or_else(internal_resolution_gap)?;

        let snapshot = self.cost_engine.overlay().snapshot();
        let env = SearchEnv {
            cost: &self.cost_engine,
            snapshot: &snapshot,
            temporal: &self.temporal,
            transition: self.transition,
            turns: &self.turns,
        };
        let heuristic =
            Heuristic::build(heuristic_kind, target_addr.node, &self.cost_engine, self.landmarks.as_ref())?;
        let budgets = SearchBudgets::per_query(&self.budgets);

        let outcome = QUERY_CTX.with(|cell| {
            let mut ctx = cell.borrow_mut();
            plan_route(
                &env,
                &heuristic,
                &budgets,
                &mut ctx,
                source_addr.node,
                target_addr.node,
                request.departure_ticks,
            )
        })?;
        self.metrics.add(&self.metrics.states_settled, outcome.settled);

        // replay the path to verify the planner's totals and recover nodes
        let (total_cost, arrival, path) = if outcome.reachable {
            let evaluation = evaluate_path(&env, &outcome.edges, request.departure_ticks)?;
            debug_assert!((evaluation.cost - outcome.cost).abs() <= 1e-6 * outcome.cost.max(1.0));
            let nodes = if outcome.edges.is_empty() {
                vec![source_addr.node]
            } else {
                evaluation.nodes
            };
            let path = self.external_path(&nodes)?;
            (evaluation.cost, evaluation.arrival, path)
        } else {
            (f64::INFINITY, request.departure_ticks, Vec::new())
        };

        Ok(RouteResponse {
            reachable: outcome.reachable,
            total_cost,
            arrival_ticks: arrival,
            path,
            source: source_addr,
            target: target_addr,
            implementation_note: match algorithm {
                Algorithm::Dijkstra => NOTE_BIDIRECTIONAL_DIJKSTRA,
                Algorithm::AStar => NOTE_BIDIRECTIONAL_A_STAR,
            },
            settled_states: outcome.settled,
            addressing: stats,
        })
    }

    fn matrix_inner(&self, request: &MatrixRequest) -> Result<MatrixResponse, RouteError> {
        let algorithm = request
            .algorithm
            .ok_or_else(|| RouteError::new(ReasonCode::AlgorithmRequired))?;
        let heuristic_kind = self.validated_heuristic(algorithm, request.heuristic)?;

        if request.sources.is_empty() {
            return Err(RouteError::new(ReasonCode::SourcesRequired));
        }
        if request.targets.is_empty() {
            return Err(RouteError::new(ReasonCode::TargetsRequired));
        }
        for slot in &request.sources {
            if slot.is_empty() {
                return Err(RouteError::new(ReasonCode::SourceRequired));
            }
        }
        for slot in &request.targets {
            if slot.is_empty() {
                return Err(RouteError::new(ReasonCode::TargetRequired));
            }
        }

        let opts = AddressingOptions {
            allow_mixed: request.allow_mixed,
            trait_id: request.addressing_trait_id.as_deref(),
            strategy_id: request.coordinate_strategy_id.as_deref(),
            max_snap_distance: request.max_snap_distance,
        };
        let slots: Vec<&AddressSlot> = request
            .sources
            .iter()
            .chain(request.targets.iter())
            .collect();
        let (resolved, stats) = self.addressing.resolve_request(&slots, &opts)?;
        self.record_addressing(&stats);
        let (source_addrs, target_addrs) = resolved.split_at(request.sources.len());

        let source_nodes: Vec<NodeId> = source_addrs.iter().map(|a| a.node).collect();
        let target_nodes: Vec<NodeId> = target_addrs.iter().map(|a| a.node).collect();

        let snapshot = self.cost_engine.overlay().snapshot();
        let env = SearchEnv {
            cost: &self.cost_engine,
            snapshot: &snapshot,
            temporal: &self.temporal,
            transition: self.transition,
            turns: &self.turns,
        };
        let params = MatrixParams {
            env: &env,
            heuristic_kind,
            landmarks: self.landmarks.as_ref(),
            budget_config: &self.budgets,
            native_astar_target_limit: self.native_astar_target_limit,
        };

        let outcome = QUERY_CTX.with(|cell| {
            let mut ctx = cell.borrow_mut();
            plan_matrix(
                &params,
                &mut ctx,
                &source_nodes,
                &target_nodes,
                request.departure_ticks,
                algorithm == Algorithm::Dijkstra,
            )
        })?;
        self.metrics.add(&self.metrics.states_settled, outcome.settled);

        Ok(MatrixResponse {
            rows: source_nodes.len(),
            cols: target_nodes.len(),
            cells: outcome.cells,
            sources: source_addrs.to_vec(),
            targets: target_addrs.to_vec(),
            implementation_note: outcome.implementation_note,
            settled_states: outcome.settled,
            addressing: stats,
        })
    }

    /// DIJKSTRA must run with the NONE heuristic; A_STAR must name one.
    fn validated_heuristic(
        &self,
        algorithm: Algorithm,
        heuristic: Option<HeuristicType>,
    ) -> Result<HeuristicType, RouteError> {
        match (algorithm, heuristic) {
            (Algorithm::Dijkstra, None | Some(HeuristicType::None)) => Ok(HeuristicType::None),
            (Algorithm::Dijkstra, Some(other)) => {
                Err(RouteError::new(ReasonCode::DijkstraHeuristicMismatch)
                    .with_message(format!("DIJKSTRA cannot run with heuristic {}", other.id())))
            }
            (Algorithm::AStar, Some(kind)) => Ok(kind),
            (Algorithm::AStar, None) => Err(RouteError::new(ReasonCode::HeuristicRequired)),
        }
    }

    fn external_path(&self, nodes: &[NodeId]) -> Result<Vec<String>, RouteError> {
        nodes
            .iter()
            .map(|&n| {
                self.mapper
                    .external(n)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        RouteError::new(ReasonCode::ExternalMappingFailed)
                            .with_message(format!("{n:?} has no external id"))
                    })
            })
            .collect()
    }

    fn record_addressing(&self, stats: &crate::addressing::AddressingStats) {
        self.metrics
            .add(&self.metrics.endpoints_resolved, stats.resolve_calls as u64);
        self.metrics
            .add(&self.metrics.dedup_saved, stats.dedup_saved as u64);
    }
}

fn internal_resolution_gap() -> RouteError {
    RouteError::new(ReasonCode::ExternalMappingFailed)
        .with_message("addressing returned fewer endpoints than requested")
}
