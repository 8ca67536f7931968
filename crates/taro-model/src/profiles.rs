//! Per-profile multiplier schedules.
//!
//! A profile is a cyclic bucket array of multipliers over one day, gated by
//! a 7-bit day-of-week mask. A multiplier of 0 makes the edge impassable
//! while that bucket applies.

use rustc_hash::FxHashMap;
use taro_common::{ProfileId, ReasonCode, RouteError, SECONDS_PER_DAY};

use crate::topology::Fnv;

bitflags::bitflags! {
    /// Day-of-week mask, Monday = bit 0.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DayMask: u8 {
        const MON = 1 << 0;
        const TUE = 1 << 1;
        const WED = 1 << 2;
        const THU = 1 << 3;
        const FRI = 1 << 4;
        const SAT = 1 << 5;
        const SUN = 1 << 6;
    }
}

impl DayMask {
    pub const WEEKDAYS: DayMask = DayMask::MON
        .union(DayMask::TUE)
        .union(DayMask::WED)
        .union(DayMask::THU)
        .union(DayMask::FRI);

    /// `day` is 0 = Monday .. 6 = Sunday.
    #[inline]
    pub fn covers(self, day: u8) -> bool {
        debug_assert!(day < 7);
        self.bits() & (1 << day) != 0
    }
}

#[derive(Debug, Clone)]
pub struct Profile {
    id: ProfileId,
    day_mask: DayMask,
    buckets: Vec<f64>,
    default_multiplier: f64,
    bucket_seconds: u32,
    min_positive_multiplier: f64,
}

impl Profile {
    pub fn new(
        id: ProfileId,
        day_mask: DayMask,
        buckets: Vec<f64>,
        default_multiplier: f64,
    ) -> Result<Self, RouteError> {
        let invalid = |msg: String| RouteError::new(ReasonCode::ModelProfileInvalid).with_message(msg);

        if id.is_none() {
            return Err(invalid("profile id must be > 0".into()));
        }
        if buckets.is_empty() {
            return Err(invalid(format!("profile {id:?} has no buckets")));
        }
        if SECONDS_PER_DAY % buckets.len() as i64 != 0 {
            return Err(invalid(format!(
                "profile {id:?}: {} buckets do not divide a day",
                buckets.len()
            )));
        }
        for (i, &m) in buckets.iter().enumerate() {
            if !m.is_finite() || m < 0.0 {
                return Err(invalid(format!("profile {id:?} bucket {i} multiplier {m}")));
            }
        }
        if !default_multiplier.is_finite() || default_multiplier < 0.0 {
            return Err(invalid(format!(
                "profile {id:?} default multiplier {default_multiplier}"
            )));
        }

        let bucket_seconds = (SECONDS_PER_DAY / buckets.len() as i64) as u32;
        let min_positive_multiplier = buckets
            .iter()
            .copied()
            .chain(std::iter::once(default_multiplier))
            .filter(|&m| m > 0.0)
            .fold(f64::INFINITY, f64::min);

        Ok(Self {
            id,
            day_mask,
            buckets,
            default_multiplier,
            bucket_seconds,
            min_positive_multiplier,
        })
    }

    #[inline]
    pub fn id(&self) -> ProfileId {
        self.id
    }

    #[inline]
    pub fn day_mask(&self) -> DayMask {
        self.day_mask
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn bucket_seconds(&self) -> u32 {
        self.bucket_seconds
    }

    #[inline]
    pub fn bucket(&self, index: usize) -> f64 {
        self.buckets[index]
    }

    #[inline]
    pub fn default_multiplier(&self) -> f64 {
        self.default_multiplier
    }

    /// Smallest multiplier that still permits traversal; `+inf` when every
    /// multiplier is 0. Lower-bound weights divide by nothing smaller.
    #[inline]
    pub fn min_positive_multiplier(&self) -> f64 {
        self.min_positive_multiplier
    }

    /// Multiplier at `second_of_day`, nearest-bucket sampling.
    #[inline]
    pub fn discrete_multiplier(&self, second_of_day: f64) -> f64 {
        let idx = (second_of_day / self.bucket_seconds as f64) as usize;
        self.buckets[idx.min(self.buckets.len() - 1)]
    }

    /// Multiplier at `second_of_day`, linear interpolation between bucket
    /// centers, wrapping across midnight.
    pub fn interpolated_multiplier(&self, second_of_day: f64) -> f64 {
        let n = self.buckets.len();
        let bs = self.bucket_seconds as f64;
        let pos = second_of_day / bs - 0.5;
        let lo = pos.floor();
        let frac = pos - lo;
        let i0 = (lo as i64).rem_euclid(n as i64) as usize;
        let i1 = (i0 + 1) % n;
        self.buckets[i0] * (1.0 - frac) + self.buckets[i1] * frac
    }
}

/// Immutable profile catalog keyed by profile id.
#[derive(Debug)]
pub struct ProfileStore {
    profiles: FxHashMap<u32, Profile>,
    fingerprint: u64,
}

impl ProfileStore {
    pub fn new(profiles: Vec<Profile>) -> Result<Self, RouteError> {
        let mut map = FxHashMap::default();
        let mut fp = Fnv::new();

        let mut sorted = profiles;
        sorted.sort_by_key(|p| p.id().0);
        for p in sorted {
            fp.update_u64(p.id().0 as u64);
            fp.update_u64(p.day_mask().bits() as u64);
            fp.update_f64s(&p.buckets);
            fp.update_u64(p.default_multiplier().to_bits());
            if map.insert(p.id().0, p).is_some() {
                return Err(RouteError::new(ReasonCode::ModelProfileInvalid)
                    .with_message("duplicate profile id"));
            }
        }

        Ok(Self {
            profiles: map,
            fingerprint: fp.finish(),
        })
    }

    pub fn empty() -> Self {
        Self::new(Vec::new()).unwrap()
    }

    #[inline]
    pub fn get(&self, id: ProfileId) -> Option<&Profile> {
        self.profiles.get(&id.0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    #[inline]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}
