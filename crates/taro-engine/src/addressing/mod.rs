//! Endpoint normalization: typed/legacy shapes, trait and strategy
//! validation, per-request deduplication, coordinate snapping, and the
//! cross-request snap cache.

pub mod snap_cache;
pub mod strategy;

use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashMap;
use taro_common::{NodeId, ReasonCode, RouteError};
use taro_model::{GraphTopology, IdMapper, KdTree};
use tracing::trace;

use snap_cache::{CachedSnap, SegmentedSnapCache, SnapKey, canonical_bits};
use strategy::{AddressType, AddressingTrait, CoordinateStrategy};

/// A typed endpoint payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    External(String),
    Coordinate { x: f64, y: f64 },
}

/// One request endpoint slot: at most one of the typed payload and the two
/// legacy compatibility fields may be present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressSlot {
    pub typed: Option<Endpoint>,
    pub legacy_external_id: Option<String>,
    pub legacy_coordinate: Option<(f64, f64)>,
}

impl AddressSlot {
    pub fn external(id: impl Into<String>) -> Self {
        Self {
            typed: Some(Endpoint::External(id.into())),
            ..Default::default()
        }
    }

    pub fn coordinate(x: f64, y: f64) -> Self {
        Self {
            typed: Some(Endpoint::Coordinate { x, y }),
            ..Default::default()
        }
    }

    pub fn legacy_external(id: impl Into<String>) -> Self {
        Self {
            legacy_external_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn legacy_coordinate(x: f64, y: f64) -> Self {
        Self {
            legacy_coordinate: Some((x, y)),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.typed.is_none()
            && self.legacy_external_id.is_none()
            && self.legacy_coordinate.is_none()
    }
}

/// Snap metadata for coordinate endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapInfo {
    pub distance: f64,
    pub query_x: f64,
    pub query_y: f64,
}

/// A fully resolved endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAddress {
    pub node: NodeId,
    pub external_id: String,
    pub snap: Option<SnapInfo>,
}

/// Per-request addressing options, taken verbatim from the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressingOptions<'a> {
    pub allow_mixed: bool,
    pub trait_id: Option<&'a str>,
    pub strategy_id: Option<&'a str>,
    pub max_snap_distance: Option<f64>,
}

/// Deterministic telemetry for one request's normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AddressingStats {
    pub endpoints: usize,
    pub unique: usize,
    pub resolve_calls: usize,
    pub dedup_saved: usize,
    pub external_count: usize,
    pub coordinate_count: usize,
    pub snap_rejections: usize,
    pub normalization_nanos: u64,
    pub mixed_mode: bool,
}

/// Canonical endpoint identity for the per-request dedup map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Fingerprint {
    External(String),
    Coordinate { strategy: u32, x_bits: u64, y_bits: u64 },
}

// normalized view of one slot after shape validation
enum Shape<'a> {
    External { id: &'a str, typed: bool },
    Coordinate { x: f64, y: f64 },
}

#[derive(Debug)]
pub struct AddressingEngine {
    bound_trait: &'static AddressingTrait,
    mapper: Arc<IdMapper>,
    topology: Arc<GraphTopology>,
    spatial: Option<Arc<KdTree>>,
    cache: SegmentedSnapCache,
}

impl AddressingEngine {
    pub fn new(
        trait_id: &str,
        mapper: Arc<IdMapper>,
        topology: Arc<GraphTopology>,
        spatial: Option<Arc<KdTree>>,
        cache_capacity: usize,
        cache_segments: usize,
    ) -> Result<Self, RouteError> {
        let bound_trait = AddressingTrait::by_id(trait_id).ok_or_else(|| {
            RouteError::new(ReasonCode::UnknownAddressingTrait)
                .with_message(format!("addressing trait '{trait_id}' is not registered"))
        })?;
        Ok(Self {
            bound_trait,
            mapper,
            topology,
            spatial,
            cache: SegmentedSnapCache::new(cache_capacity, cache_segments),
        })
    }

    #[inline]
    pub fn bound_trait_id(&self) -> &'static str {
        self.bound_trait.id
    }

    pub fn snap_cache(&self) -> &SegmentedSnapCache {
        &self.cache
    }

    /// Resolve every slot of one request. Slots arrive in request order and
    /// resolve in that order; duplicates cost one resolve call.
    pub fn resolve_request(
        &self,
        slots: &[&AddressSlot],
        opts: &AddressingOptions<'_>,
    ) -> Result<(Vec<ResolvedAddress>, AddressingStats), RouteError> {
        let started = Instant::now();
        let mut stats = AddressingStats {
            endpoints: slots.len(),
            ..Default::default()
        };

        if let Some(requested) = opts.trait_id {
            let known = AddressingTrait::by_id(requested).ok_or_else(|| {
                RouteError::new(ReasonCode::UnknownAddressingTrait)
                    .with_message(format!("addressing trait '{requested}' is not registered"))
            })?;
            if known.id != self.bound_trait.id {
                return Err(RouteError::new(ReasonCode::AddressingRuntimeMismatch)
                    .with_message(format!(
                        "request selects trait '{}' but the engine is bound to '{}'",
                        known.id, self.bound_trait.id
                    )));
            }
        }

        let shapes = slots
            .iter()
            .map(|slot| self.shape_of(slot))
            .collect::<Result<Vec<_>, _>>()?;

        let has_external = shapes.iter().any(|s| matches!(s, Shape::External { .. }));
        let has_coordinate = shapes.iter().any(|s| matches!(s, Shape::Coordinate { .. }));
        stats.mixed_mode = has_external && has_coordinate;
        if stats.mixed_mode && !opts.allow_mixed {
            return Err(RouteError::new(ReasonCode::MixedModeDisabled)
                .with_message("request mixes external-id and coordinate endpoints"));
        }

        let mut dedup: FxHashMap<Fingerprint, ResolvedAddress> = FxHashMap::default();
        let mut resolved = Vec::with_capacity(shapes.len());
        for shape in &shapes {
            match shape {
                Shape::External { .. } => stats.external_count += 1,
                Shape::Coordinate { .. } => stats.coordinate_count += 1,
            }
            let fingerprint = self.fingerprint_of(shape, opts)?;
            if let Some(hit) = dedup.get(&fingerprint) {
                stats.dedup_saved += 1;
                resolved.push(hit.clone());
                continue;
            }
            stats.resolve_calls += 1;
            let address = self.resolve_one(shape, opts, &mut stats)?;
            dedup.insert(fingerprint, address.clone());
            resolved.push(address);
        }
        stats.unique = dedup.len();
        stats.normalization_nanos = started.elapsed().as_nanos() as u64;

        trace!(
            endpoints = stats.endpoints,
            unique = stats.unique,
            dedup_saved = stats.dedup_saved,
            mixed = stats.mixed_mode,
            "request endpoints normalized"
        );
        Ok((resolved, stats))
    }

    /// Shape-validate one slot and pick the effective payload.
    fn shape_of<'a>(&self, slot: &'a AddressSlot) -> Result<Shape<'a>, RouteError> {
        let legacy_present = slot.legacy_external_id.is_some() || slot.legacy_coordinate.is_some();
        if slot.typed.is_some() && legacy_present {
            return Err(RouteError::new(ReasonCode::TypedLegacyAmbiguity)
                .with_message("endpoint carries both typed and legacy payloads"));
        }
        if slot.legacy_external_id.is_some() && slot.legacy_coordinate.is_some() {
            return Err(RouteError::new(ReasonCode::TypedLegacyAmbiguity)
                .with_message("endpoint carries both legacy payloads"));
        }

        let (shape, kind) = match (&slot.typed, &slot.legacy_external_id, &slot.legacy_coordinate)
        {
            (Some(Endpoint::External(id)), _, _) => {
                if id.is_empty() {
                    return Err(RouteError::new(ReasonCode::MalformedTypedPayload)
                        .with_message("typed external id is empty"));
                }
                (
                    Shape::External {
                        id: id.as_str(),
                        typed: true,
                    },
                    AddressType::ExternalId,
                )
            }
            (Some(Endpoint::Coordinate { x, y }), _, _) => {
                (Shape::Coordinate { x: *x, y: *y }, AddressType::Coordinate)
            }
            (None, Some(id), _) => (
                Shape::External {
                    id: id.as_str(),
                    typed: false,
                },
                AddressType::ExternalId,
            ),
            (None, None, Some((x, y))) => {
                (Shape::Coordinate { x: *x, y: *y }, AddressType::Coordinate)
            }
            (None, None, None) => {
                // callers reject empty slots with the role-specific code
                return Err(RouteError::new(ReasonCode::MalformedTypedPayload)
                    .with_message("endpoint slot is empty"));
            }
        };

        if !self.bound_trait.supports(kind) {
            return Err(RouteError::new(ReasonCode::UnsupportedAddressType).with_message(
                format!(
                    "trait '{}' does not accept {kind:?} endpoints",
                    self.bound_trait.id
                ),
            ));
        }
        Ok(shape)
    }

    fn strategy_for(&self, opts: &AddressingOptions<'_>) -> Result<&'static CoordinateStrategy, RouteError> {
        let id = opts.strategy_id.ok_or_else(|| {
            RouteError::new(ReasonCode::CoordinateStrategyRequired)
                .with_message("coordinate endpoints need a coordinate strategy id")
        })?;
        CoordinateStrategy::by_id(id).ok_or_else(|| {
            RouteError::new(ReasonCode::UnknownCoordinateStrategy)
                .with_message(format!("coordinate strategy '{id}' is not registered"))
        })
    }

    fn fingerprint_of(
        &self,
        shape: &Shape<'_>,
        opts: &AddressingOptions<'_>,
    ) -> Result<Fingerprint, RouteError> {
        Ok(match shape {
            Shape::External { id, .. } => Fingerprint::External((*id).to_string()),
            Shape::Coordinate { x, y } => {
                let strategy = self.strategy_for(opts)?;
                Fingerprint::Coordinate {
                    strategy: strategy.index,
                    x_bits: canonical_bits(*x),
                    y_bits: canonical_bits(*y),
                }
            }
        })
    }

    fn resolve_one(
        &self,
        shape: &Shape<'_>,
        opts: &AddressingOptions<'_>,
        stats: &mut AddressingStats,
    ) -> Result<ResolvedAddress, RouteError> {
        match shape {
            Shape::External { id, typed } => self.resolve_external(id, *typed),
            Shape::Coordinate { x, y } => self.resolve_coordinate(*x, *y, opts, stats),
        }
    }

    fn resolve_external(&self, id: &str, typed: bool) -> Result<ResolvedAddress, RouteError> {
        let node = self.mapper.internal(id).ok_or_else(|| {
            let code = if typed {
                ReasonCode::UnknownTypedExternalNode
            } else {
                ReasonCode::UnknownExternalNode
            };
            RouteError::new(code).with_message(format!("external node '{id}'"))
        })?;
        if !self.topology.contains_node(node) {
            return Err(RouteError::new(ReasonCode::InternalNodeOutOfBounds)
                .with_message(format!("'{id}' maps to {node:?} beyond the node range")));
        }
        self.canonical(node, None)
    }

    fn resolve_coordinate(
        &self,
        x: f64,
        y: f64,
        opts: &AddressingOptions<'_>,
        stats: &mut AddressingStats,
    ) -> Result<ResolvedAddress, RouteError> {
        let strategy = self.strategy_for(opts)?;
        strategy.validate(x, y)?;

        let max_snap = match opts.max_snap_distance {
            Some(v) if v.is_finite() && v > 0.0 => v,
            Some(v) => {
                return Err(RouteError::new(ReasonCode::InvalidMaxSnapDistance)
                    .with_message(format!("max snap distance {v}")));
            }
            None => strategy.default_max_snap(),
        };

        let key = SnapKey {
            graph_fingerprint: self.topology.fingerprint(),
            mapper_fingerprint: self.mapper.fingerprint(),
            trait_id: self.bound_trait.id,
            strategy_index: strategy.index,
            max_snap_bits: canonical_bits(max_snap),
            x_bits: canonical_bits(x),
            y_bits: canonical_bits(y),
        };
        if let Some(cached) = self.cache.get(&key) {
            return self.canonical(
                cached.node,
                Some(SnapInfo {
                    distance: cached.snap_distance,
                    query_x: x,
                    query_y: y,
                }),
            );
        }

        let spatial = self.spatial.as_ref().ok_or_else(|| {
            RouteError::new(ReasonCode::SpatialRuntimeUnavailable)
                .with_message("model carries no spatial index")
        })?;
        let (node, _) = spatial.nearest(x, y).ok_or_else(|| {
            RouteError::new(ReasonCode::SpatialRuntimeUnavailable)
                .with_message("spatial index has no indexed nodes")
        })?;

        let node_coord = self.topology.coordinate(node).ok_or_else(|| {
            RouteError::new(ReasonCode::SpatialRuntimeUnavailable)
                .with_message(format!("{node:?} has no coordinate"))
        })?;
        let distance = strategy.distance(x, y, node_coord);
        if !distance.is_finite() || distance < 0.0 {
            return Err(RouteError::new(ReasonCode::CoordinateStrategyFailure)
                .with_message(format!("strategy '{}' produced {distance}", strategy.id)));
        }
        if distance > max_snap {
            stats.snap_rejections += 1;
            return Err(RouteError::new(ReasonCode::SnapThresholdExceeded).with_message(
                format!("snap distance {distance:.3} exceeds limit {max_snap:.3}"),
            ));
        }

        self.cache.insert(
            key,
            CachedSnap {
                node,
                snap_distance: distance,
            },
        );
        self.canonical(
            node,
            Some(SnapInfo {
                distance,
                query_x: x,
                query_y: y,
            }),
        )
    }

    fn canonical(&self, node: NodeId, snap: Option<SnapInfo>) -> Result<ResolvedAddress, RouteError> {
        let external_id = self
            .mapper
            .external(node)
            .ok_or_else(|| {
                RouteError::new(ReasonCode::ExternalMappingFailed)
                    .with_message(format!("{node:?} has no external id"))
            })?
            .to_string();
        Ok(ResolvedAddress {
            node,
            external_id,
            snap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taro_model::fixture::FixtureBuilder;

    fn engine() -> (AddressingEngine, taro_model::fixture::Fixture) {
        let f = FixtureBuilder::new()
            .node_at("N0", 0.0, 0.0)
            .node_at("N1", 10.0, 0.0)
            .node_at("N2", 20.0, 0.0)
            .edge("N0", "N1", 1.0)
            .edge("N1", "N2", 1.0)
            .build();
        let engine = AddressingEngine::new(
            "DEFAULT",
            f.mapper.clone(),
            f.topology.clone(),
            f.spatial.clone(),
            64,
            4,
        )
        .unwrap();
        (engine, f)
    }

    fn xy_opts() -> AddressingOptions<'static> {
        AddressingOptions {
            allow_mixed: true,
            trait_id: None,
            strategy_id: Some("XY"),
            max_snap_distance: None,
        }
    }

    #[test]
    fn typed_external_resolves_to_internal_node() {
        let (engine, f) = engine();
        let slot = AddressSlot::external("N1");
        let (resolved, stats) = engine.resolve_request(&[&slot], &xy_opts()).unwrap();
        assert_eq!(resolved[0].node, f.node("N1"));
        assert_eq!(resolved[0].external_id, "N1");
        assert!(resolved[0].snap.is_none());
        assert_eq!(stats.resolve_calls, 1);
    }

    #[test]
    fn typed_and_legacy_together_are_ambiguous() {
        let (engine, _) = engine();
        let slot = AddressSlot {
            typed: Some(Endpoint::External("N1".into())),
            legacy_external_id: Some("N1".into()),
            legacy_coordinate: None,
        };
        let err = engine.resolve_request(&[&slot], &xy_opts()).unwrap_err();
        assert_eq!(err.code, ReasonCode::TypedLegacyAmbiguity);
    }

    #[test]
    fn unknown_nodes_split_by_payload_kind() {
        let (engine, _) = engine();
        let typed = AddressSlot::external("NX");
        let err = engine.resolve_request(&[&typed], &xy_opts()).unwrap_err();
        assert_eq!(err.code, ReasonCode::UnknownTypedExternalNode);

        let legacy = AddressSlot::legacy_external("NX");
        let err = engine.resolve_request(&[&legacy], &xy_opts()).unwrap_err();
        assert_eq!(err.code, ReasonCode::UnknownExternalNode);
    }

    #[test]
    fn coordinate_snaps_to_nearest_node() {
        let (engine, f) = engine();
        let slot = AddressSlot::coordinate(9.0, 1.0);
        let (resolved, _) = engine.resolve_request(&[&slot], &xy_opts()).unwrap();
        assert_eq!(resolved[0].node, f.node("N1"));
        let snap = resolved[0].snap.unwrap();
        assert!((snap.distance - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn snap_threshold_is_a_sharp_boundary() {
        let (engine, _) = engine();
        let slot = AddressSlot::coordinate(10.0, 5.0);
        let mut opts = xy_opts();
        opts.max_snap_distance = Some(4.999);
        let err = engine.resolve_request(&[&slot], &opts).unwrap_err();
        assert_eq!(err.code, ReasonCode::SnapThresholdExceeded);
        opts.max_snap_distance = Some(5.0);
        assert!(engine.resolve_request(&[&slot], &opts).is_ok());
    }

    #[test]
    fn coordinate_without_strategy_is_rejected() {
        let (engine, _) = engine();
        let slot = AddressSlot::coordinate(1.0, 1.0);
        let mut opts = xy_opts();
        opts.strategy_id = None;
        let err = engine.resolve_request(&[&slot], &opts).unwrap_err();
        assert_eq!(err.code, ReasonCode::CoordinateStrategyRequired);
        opts.strategy_id = Some("POLAR");
        let err = engine.resolve_request(&[&slot], &opts).unwrap_err();
        assert_eq!(err.code, ReasonCode::UnknownCoordinateStrategy);
    }

    #[test]
    fn mixed_mode_needs_opt_in() {
        let (engine, _) = engine();
        let a = AddressSlot::external("N0");
        let b = AddressSlot::coordinate(20.0, 0.0);
        let mut opts = xy_opts();
        opts.allow_mixed = false;
        let err = engine.resolve_request(&[&a, &b], &opts).unwrap_err();
        assert_eq!(err.code, ReasonCode::MixedModeDisabled);
        opts.allow_mixed = true;
        let (resolved, stats) = engine.resolve_request(&[&a, &b], &opts).unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(stats.mixed_mode);
    }

    #[test]
    fn duplicates_cost_one_resolve_call() {
        let (engine, _) = engine();
        let a = AddressSlot::external("N0");
        let b = AddressSlot::external("N1");
        let c = AddressSlot::external("N0");
        let d = AddressSlot::coordinate(0.0, 0.0);
        let e = AddressSlot::coordinate(-0.0, 0.0); // same canonical bits
        let (resolved, stats) = engine
            .resolve_request(&[&a, &b, &c, &d, &e], &xy_opts())
            .unwrap();
        assert_eq!(resolved.len(), 5);
        assert_eq!(stats.endpoints, 5);
        assert_eq!(stats.unique, 3);
        assert_eq!(stats.resolve_calls, 3);
        assert_eq!(stats.dedup_saved, 2);
        assert_eq!(resolved[0], resolved[2]);
    }

    #[test]
    fn bound_trait_gates_address_types() {
        let f = FixtureBuilder::new()
            .node_at("N0", 0.0, 0.0)
            .node_at("N1", 5.0, 0.0)
            .edge("N0", "N1", 1.0)
            .build();
        let engine = AddressingEngine::new(
            "EXTERNAL_ID_ONLY",
            f.mapper.clone(),
            f.topology.clone(),
            f.spatial.clone(),
            16,
            1,
        )
        .unwrap();
        let slot = AddressSlot::coordinate(0.0, 0.0);
        let err = engine.resolve_request(&[&slot], &xy_opts()).unwrap_err();
        assert_eq!(err.code, ReasonCode::UnsupportedAddressType);
    }

    #[test]
    fn requested_trait_must_match_binding() {
        let (engine, _) = engine();
        let slot = AddressSlot::external("N0");
        let mut opts = xy_opts();
        opts.trait_id = Some("EXTERNAL_ID_ONLY");
        let err = engine.resolve_request(&[&slot], &opts).unwrap_err();
        assert_eq!(err.code, ReasonCode::AddressingRuntimeMismatch);
        opts.trait_id = Some("BOGUS");
        let err = engine.resolve_request(&[&slot], &opts).unwrap_err();
        assert_eq!(err.code, ReasonCode::UnknownAddressingTrait);
    }

    #[test]
    fn snap_cache_serves_repeat_requests() {
        let (engine, _) = engine();
        let slot = AddressSlot::coordinate(9.0, 1.0);
        engine.resolve_request(&[&slot], &xy_opts()).unwrap();
        let misses = engine.snap_cache().miss_count();
        engine.resolve_request(&[&slot], &xy_opts()).unwrap();
        assert_eq!(engine.snap_cache().miss_count(), misses);
        assert!(engine.snap_cache().hit_count() >= 1);
    }

    #[test]
    fn no_spatial_index_is_a_runtime_gap() {
        let f = FixtureBuilder::new()
            .nodes(["N0", "N1"])
            .edge("N0", "N1", 1.0)
            .build();
        let engine = AddressingEngine::new(
            "DEFAULT",
            f.mapper.clone(),
            f.topology.clone(),
            None,
            16,
            1,
        )
        .unwrap();
        let slot = AddressSlot::coordinate(0.0, 0.0);
        let err = engine.resolve_request(&[&slot], &xy_opts()).unwrap_err();
        assert_eq!(err.code, ReasonCode::SpatialRuntimeUnavailable);
    }
}
