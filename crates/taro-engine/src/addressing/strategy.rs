//! Addressing traits and coordinate strategies.
//!
//! Both catalogs are fixed at startup; requests select by id and the
//! runtime validates the selection against the bound configuration.

use once_cell::sync::Lazy;
use taro_common::{ReasonCode, RouteError};
use taro_model::Coordinate;

use crate::heuristics::haversine_meters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    ExternalId,
    Coordinate,
}

/// A runtime-bound addressing dimension: which address types the engine
/// accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressingTrait {
    pub id: &'static str,
    supports_external: bool,
    supports_coordinate: bool,
}

impl AddressingTrait {
    pub const DEFAULT: AddressingTrait = AddressingTrait {
        id: "DEFAULT",
        supports_external: true,
        supports_coordinate: true,
    };
    pub const EXTERNAL_ID_ONLY: AddressingTrait = AddressingTrait {
        id: "EXTERNAL_ID_ONLY",
        supports_external: true,
        supports_coordinate: false,
    };

    #[inline]
    pub fn supports(&self, kind: AddressType) -> bool {
        match kind {
            AddressType::ExternalId => self.supports_external,
            AddressType::Coordinate => self.supports_coordinate,
        }
    }

    pub fn by_id(id: &str) -> Option<&'static AddressingTrait> {
        TRAIT_CATALOG.iter().find(|t| t.id == id)
    }
}

static TRAIT_CATALOG: Lazy<Vec<AddressingTrait>> =
    Lazy::new(|| vec![AddressingTrait::DEFAULT, AddressingTrait::EXTERNAL_ID_ONLY]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrategyKind {
    Xy,
    LatLon,
}

/// Interpretation of coordinate pairs: validation rules, distance metric,
/// and the default snap ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateStrategy {
    pub id: &'static str,
    /// Dense index used in cache keys and dedup fingerprints.
    pub index: u32,
    kind: StrategyKind,
    default_max_snap: f64,
}

impl CoordinateStrategy {
    pub const XY: CoordinateStrategy = CoordinateStrategy {
        id: "XY",
        index: 0,
        kind: StrategyKind::Xy,
        default_max_snap: 1000.0,
    };
    pub const LAT_LON: CoordinateStrategy = CoordinateStrategy {
        id: "LAT_LON",
        index: 1,
        kind: StrategyKind::LatLon,
        default_max_snap: 250.0,
    };

    pub fn by_id(id: &str) -> Option<&'static CoordinateStrategy> {
        STRATEGY_CATALOG.iter().find(|s| s.id == id)
    }

    #[inline]
    pub fn default_max_snap(&self) -> f64 {
        self.default_max_snap
    }

    /// Shape validation of a query coordinate.
    pub fn validate(&self, x: f64, y: f64) -> Result<(), RouteError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(RouteError::new(ReasonCode::NonFiniteCoordinates)
                .with_message(format!("coordinate ({x}, {y})")));
        }
        if self.kind == StrategyKind::LatLon && (x.abs() > 90.0 || y.abs() > 180.0) {
            return Err(RouteError::new(ReasonCode::LatLonRange)
                .with_message(format!("latitude {x}, longitude {y}")));
        }
        Ok(())
    }

    /// Distance between a query point and a node coordinate, in the
    /// strategy's unit (plain units for XY, meters for LAT_LON).
    #[inline]
    pub fn distance(&self, x: f64, y: f64, node: Coordinate) -> f64 {
        match self.kind {
            StrategyKind::Xy => ((x - node.x).powi(2) + (y - node.y).powi(2)).sqrt(),
            StrategyKind::LatLon => haversine_meters(Coordinate::new(x, y), node),
        }
    }
}

static STRATEGY_CATALOG: Lazy<Vec<CoordinateStrategy>> =
    Lazy::new(|| vec![CoordinateStrategy::XY, CoordinateStrategy::LAT_LON]);
