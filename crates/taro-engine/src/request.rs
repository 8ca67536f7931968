//! Query surface: request and response shapes.
//!
//! Responses are self-contained value types; nothing in them aliases
//! engine-internal state, so callers may mutate them freely.

use taro_common::{ReasonCode, RouteError, Ticks};

use crate::addressing::{AddressSlot, AddressingStats, ResolvedAddress};
use crate::heuristics::HeuristicType;
pub use crate::addressing::Endpoint;
pub use crate::search::matrix::MatrixCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Dijkstra,
    AStar,
}

impl Algorithm {
    pub fn from_id(id: &str) -> Result<Self, RouteError> {
        match id {
            "DIJKSTRA" => Ok(Algorithm::Dijkstra),
            "A_STAR" => Ok(Algorithm::AStar),
            other => Err(RouteError::new(ReasonCode::AlgorithmRequired)
                .with_message(format!("unknown algorithm '{other}'"))),
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Algorithm::Dijkstra => "DIJKSTRA",
            Algorithm::AStar => "A_STAR",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    pub source: AddressSlot,
    pub target: AddressSlot,
    pub departure_ticks: Ticks,
    pub algorithm: Option<Algorithm>,
    pub heuristic: Option<HeuristicType>,
    pub allow_mixed: bool,
    pub addressing_trait_id: Option<String>,
    pub coordinate_strategy_id: Option<String>,
    pub max_snap_distance: Option<f64>,
}

impl RouteRequest {
    pub fn new(source: AddressSlot, target: AddressSlot, departure_ticks: Ticks) -> Self {
        Self {
            source,
            target,
            departure_ticks,
            ..Default::default()
        }
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn heuristic(mut self, heuristic: HeuristicType) -> Self {
        self.heuristic = Some(heuristic);
        self
    }

    pub fn allow_mixed(mut self, allow: bool) -> Self {
        self.allow_mixed = allow;
        self
    }

    pub fn coordinate_strategy(mut self, id: impl Into<String>) -> Self {
        self.coordinate_strategy_id = Some(id.into());
        self
    }

    pub fn max_snap_distance(mut self, distance: f64) -> Self {
        self.max_snap_distance = Some(distance);
        self
    }

    pub fn addressing_trait(mut self, id: impl Into<String>) -> Self {
        self.addressing_trait_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteResponse {
    pub reachable: bool,
    /// `+inf` sentinel when unreachable.
    pub total_cost: f64,
    pub arrival_ticks: Ticks,
    /// Ordered external node ids; empty when unreachable.
    pub path: Vec<String>,
    pub source: ResolvedAddress,
    pub target: ResolvedAddress,
    pub implementation_note: &'static str,
    pub settled_states: u64,
    pub addressing: AddressingStats,
}

#[derive(Debug, Clone, Default)]
pub struct MatrixRequest {
    pub sources: Vec<AddressSlot>,
    pub targets: Vec<AddressSlot>,
    pub departure_ticks: Ticks,
    pub algorithm: Option<Algorithm>,
    pub heuristic: Option<HeuristicType>,
    pub allow_mixed: bool,
    pub addressing_trait_id: Option<String>,
    pub coordinate_strategy_id: Option<String>,
    pub max_snap_distance: Option<f64>,
}

impl MatrixRequest {
    pub fn new(
        sources: Vec<AddressSlot>,
        targets: Vec<AddressSlot>,
        departure_ticks: Ticks,
    ) -> Self {
        Self {
            sources,
            targets,
            departure_ticks,
            ..Default::default()
        }
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn heuristic(mut self, heuristic: HeuristicType) -> Self {
        self.heuristic = Some(heuristic);
        self
    }

    pub fn allow_mixed(mut self, allow: bool) -> Self {
        self.allow_mixed = allow;
        self
    }

    pub fn coordinate_strategy(mut self, id: impl Into<String>) -> Self {
        self.coordinate_strategy_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixResponse {
    pub rows: usize,
    pub cols: usize,
    /// Row-major, request order, including duplicates.
    pub cells: Vec<MatrixCell>,
    pub sources: Vec<ResolvedAddress>,
    pub targets: Vec<ResolvedAddress>,
    pub implementation_note: &'static str,
    pub settled_states: u64,
    pub addressing: AddressingStats,
}

impl MatrixResponse {
    #[inline]
    pub fn cell(&self, row: usize, col: usize) -> &MatrixCell {
        &self.cells[row * self.cols + col]
    }
}
