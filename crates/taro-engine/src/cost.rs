//! Edge-traversal cost composition.
//!
//! `edge_cost` folds the live overlay, the edge's profile schedule, and the
//! temporal frame into a finite cost in seconds, or `+inf` when the edge is
//! impassable at the entry instant. Turn penalties are the transition
//! policy's concern, not this module's.

use std::sync::Arc;

use taro_common::{EdgeId, Ticks, saturating_advance};
use taro_model::{GraphTopology, Profile, ProfileStore};

use crate::overlay::{LiveOverlay, OverlaySnapshot};
use crate::temporal::{TemporalContext, TimeSample};

/// Multiplier sampling, fixed at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingPolicy {
    /// Nearest bucket.
    #[default]
    Discrete,
    /// Linear between bucket centers.
    Interpolated,
}

#[derive(Debug)]
pub struct CostEngine {
    topology: Arc<GraphTopology>,
    profiles: Arc<ProfileStore>,
    overlay: Arc<LiveOverlay>,
    sampling: SamplingPolicy,
    ticks_per_second: i64,
    /// Admissible time-independent bound per edge, in seconds: base weight
    /// scaled by the profile's smallest positive multiplier.
    lower_bounds: Vec<f64>,
}

impl CostEngine {
    pub fn new(
        topology: Arc<GraphTopology>,
        profiles: Arc<ProfileStore>,
        overlay: Arc<LiveOverlay>,
        sampling: SamplingPolicy,
        ticks_per_second: i64,
    ) -> Self {
        let lower_bounds = (0..topology.edge_count())
            .map(|e| {
                let edge = EdgeId(e as u32);
                let base = topology.base_weight(edge);
                match profiles.get(topology.profile_id(edge)) {
                    Some(p) => {
                        let m = p.min_positive_multiplier();
                        if m.is_finite() { base * m } else { f64::INFINITY }
                    }
                    None => base,
                }
            })
            .collect();
        Self {
            topology,
            profiles,
            overlay,
            sampling,
            ticks_per_second: ticks_per_second.max(1),
            lower_bounds,
        }
    }

    /// Traversal cost in seconds for entering `edge` at `entry`, under the
    /// query's overlay snapshot and temporal frame. `+inf` = impassable.
    pub fn edge_cost(
        &self,
        snapshot: &OverlaySnapshot,
        temporal: &TemporalContext,
        edge: EdgeId,
        entry: Ticks,
    ) -> f64 {
        let mut base = self.topology.base_weight(edge);

        if let Some(factor) = snapshot.factor_at(edge, entry) {
            if factor <= 0.0 {
                return f64::INFINITY;
            }
            base /= factor;
        }

        let multiplier = match self.profiles.get(self.topology.profile_id(edge)) {
            Some(profile) => self.multiplier(profile, temporal.resolve(entry)),
            None => 1.0,
        };
        if multiplier <= 0.0 {
            return f64::INFINITY;
        }

        let cost = base * multiplier;
        if !cost.is_finite() || cost < 0.0 {
            return f64::INFINITY;
        }
        cost
    }

    fn multiplier(&self, profile: &Profile, sample: TimeSample) -> f64 {
        if sample.masked && !profile.day_mask().covers(sample.day_of_week) {
            return profile.default_multiplier();
        }
        match self.sampling {
            SamplingPolicy::Discrete => profile.discrete_multiplier(sample.second_of_day),
            SamplingPolicy::Interpolated => profile.interpolated_multiplier(sample.second_of_day),
        }
    }

    /// Arrival instant after spending `cost_seconds` from `entry`. Saturates
    /// at the tick maximum; never earlier than `entry`.
    #[inline]
    pub fn arrival_after(&self, entry: Ticks, cost_seconds: f64) -> Ticks {
        saturating_advance(entry, cost_seconds * self.ticks_per_second as f64)
    }

    /// Ticks equivalent of a cost in seconds (for turn penalties).
    #[inline]
    pub fn seconds_to_ticks(&self, seconds: f64) -> f64 {
        seconds * self.ticks_per_second as f64
    }

    #[inline]
    pub fn lower_bound(&self, edge: EdgeId) -> f64 {
        self.lower_bounds[edge.index()]
    }

    #[inline]
    pub fn topology(&self) -> &Arc<GraphTopology> {
        &self.topology
    }

    #[inline]
    pub fn profiles(&self) -> &Arc<ProfileStore> {
        &self.profiles
    }

    #[inline]
    pub fn overlay(&self) -> &Arc<LiveOverlay> {
        &self.overlay
    }

    #[inline]
    pub fn sampling(&self) -> SamplingPolicy {
        self.sampling
    }

    #[inline]
    pub fn ticks_per_second(&self) -> i64 {
        self.ticks_per_second
    }
}
