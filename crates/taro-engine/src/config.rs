//! Startup-only engine configuration.
//!
//! Everything here is bound once at `Router` construction; requests can
//! select among the bound options but never rebind them.

use crate::cost::SamplingPolicy;
use crate::search::budget::BudgetConfig;
use crate::temporal::TimezonePolicy;

#[derive(Debug, Clone)]
pub struct AddressingConfig {
    pub trait_id: String,
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            trait_id: "DEFAULT".into(),
        }
    }
}

/// `trait_id = None` selects the EDGE_BASED default; an explicitly empty id
/// is a configuration error.
#[derive(Debug, Clone, Default)]
pub struct TransitionConfig {
    pub trait_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TemporalConfig {
    /// "LINEAR" or "CALENDAR".
    pub trait_id: String,
    pub timezone_policy: TimezonePolicy,
    /// Overrides the model's profile timezone under `ModelTimezone`.
    pub zone_id: Option<String>,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            trait_id: "LINEAR".into(),
            timezone_policy: TimezonePolicy::Utc,
            zone_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SnapCacheConfig {
    pub capacity: usize,
    pub segments: usize,
}

impl Default for SnapCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            segments: 8,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub addressing: AddressingConfig,
    pub transition: TransitionConfig,
    pub temporal: TemporalConfig,
    pub budgets: BudgetConfig,
    pub snap_cache: SnapCacheConfig,
    pub sampling: SamplingPolicy,
    pub native_astar_target_limit: usize,
}

impl EngineConfig {
    pub fn effective_native_astar_target_limit(&self) -> usize {
        if self.native_astar_target_limit == 0 {
            32
        } else {
            self.native_astar_target_limit
        }
    }
}
