pub mod addressing;
pub mod config;
pub mod cost;
pub mod heuristics;
pub mod overlay;
pub mod request;
pub mod router;
pub mod search;
pub mod telemetry;
pub mod temporal;
pub mod time;
pub mod transition;

pub use addressing::{AddressSlot, AddressingStats, ResolvedAddress, SnapInfo};
pub use config::EngineConfig;
pub use cost::{CostEngine, SamplingPolicy};
pub use heuristics::HeuristicType;
pub use overlay::{BatchOutcome, LiveOverlay, LiveUpdate};
pub use request::{
    Algorithm, Endpoint, MatrixCell, MatrixRequest, MatrixResponse, RouteRequest, RouteResponse,
};
pub use router::Router;
pub use search::BudgetConfig;
pub use temporal::{TemporalContext, TemporalTrait, TimezonePolicy};
pub use transition::TransitionTrait;
