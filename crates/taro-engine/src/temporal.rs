//! Temporal-resolution trait: LINEAR tick math vs. CALENDAR civil time.
//!
//! The trait and timezone policy are bound once at startup; queries receive
//! an immutable `TemporalContext` and never touch zone data directly.

use std::str::FromStr;
use std::sync::Arc;

use chrono_tz::Tz;
use taro_common::{ReasonCode, RouteError, SECONDS_PER_DAY, Ticks};

use crate::time::OffsetCache;

/// Runtime-selectable temporal dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalTrait {
    /// All time is UTC ticks; profile day masks are ignored.
    Linear,
    /// Civil day-of-week and bucket resolution under a timezone policy.
    Calendar,
}

impl TemporalTrait {
    pub fn from_id(id: &str) -> Result<Self, RouteError> {
        match id {
            "LINEAR" => Ok(TemporalTrait::Linear),
            "CALENDAR" => Ok(TemporalTrait::Calendar),
            other => Err(RouteError::new(ReasonCode::TemporalResolutionFailure)
                .with_message(format!("unknown temporal trait '{other}'"))),
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            TemporalTrait::Linear => "LINEAR",
            TemporalTrait::Calendar => "CALENDAR",
        }
    }
}

/// Which zone CALENDAR resolution runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimezonePolicy {
    Utc,
    /// The zone the model's profiles were compiled against.
    ModelTimezone,
}

/// One instant, resolved to the civil frame of the bound trait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// 0 = Monday .. 6 = Sunday.
    pub day_of_week: u8,
    /// Seconds past local midnight, fractional when ticks are sub-second.
    pub second_of_day: f64,
    /// Whether day masks apply (false under LINEAR).
    pub masked: bool,
}

#[derive(Debug, Clone)]
enum TemporalMode {
    Linear,
    Calendar { cache: Arc<OffsetCache> },
}

/// Immutable per-engine binding of trait + zone + tick rate.
#[derive(Debug, Clone)]
pub struct TemporalContext {
    ticks_per_second: i64,
    mode: TemporalMode,
}

impl TemporalContext {
    pub fn linear(ticks_per_second: i64) -> Self {
        Self {
            ticks_per_second: ticks_per_second.max(1),
            mode: TemporalMode::Linear,
        }
    }

    /// Bind CALENDAR resolution. `zone_id` is the effective zone after the
    /// timezone policy is applied (UTC, or the model's profile zone).
    pub fn calendar(ticks_per_second: i64, zone_id: &str) -> Result<Self, RouteError> {
        let zone = Tz::from_str(zone_id).map_err(|_| {
            RouteError::new(ReasonCode::TemporalResolutionFailure)
                .with_message(format!("unknown timezone '{zone_id}'"))
        })?;
        Ok(Self {
            ticks_per_second: ticks_per_second.max(1),
            mode: TemporalMode::Calendar {
                cache: Arc::new(OffsetCache::new(zone)),
            },
        })
    }

    #[inline]
    pub fn trait_kind(&self) -> TemporalTrait {
        match self.mode {
            TemporalMode::Linear => TemporalTrait::Linear,
            TemporalMode::Calendar { .. } => TemporalTrait::Calendar,
        }
    }

    #[inline]
    pub fn ticks_per_second(&self) -> i64 {
        self.ticks_per_second
    }

    /// Resolve `ticks` to day-of-week and second-of-day in the bound frame.
    pub fn resolve(&self, ticks: Ticks) -> TimeSample {
        let tps = self.ticks_per_second;
        let epoch_second = ticks.div_euclid(tps);
        let subsecond = ticks.rem_euclid(tps) as f64 / tps as f64;

        let (offset, masked) = match &self.mode {
            TemporalMode::Linear => (0i64, false),
            TemporalMode::Calendar { cache } => {
                (cache.offset_seconds(epoch_second) as i64, true)
            }
        };

        let local = epoch_second.saturating_add(offset);
        let day = local.div_euclid(SECONDS_PER_DAY);
        // epoch day 0 (1970-01-01) was a Thursday; Monday = 0
        let day_of_week = (day + 3).rem_euclid(7) as u8;
        let second_of_day = local.rem_euclid(SECONDS_PER_DAY) as f64 + subsecond;

        TimeSample {
            day_of_week,
            second_of_day,
            masked,
        }
    }
}
