//! Per-day UTC-offset windows, computed once per zone/day and cached.
//!
//! Calendar resolution needs the local offset at arbitrary instants. Zone
//! transition walks are not cheap enough for the expansion hot path, so the
//! cache stores, per epoch day, the ordered list of offset windows covering
//! that day; lookups are a linear scan over at most a few entries.

use chrono::{DateTime, Offset, TimeZone};
use chrono_tz::Tz;
use dashmap::DashMap;
use smallvec::SmallVec;
use taro_common::SECONDS_PER_DAY;

/// Half-open `[start, end)` range of UTC epoch seconds sharing one offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetWindow {
    pub start: i64,
    pub end: i64,
    pub offset_seconds: i32,
}

type DayWindows = SmallVec<[OffsetWindow; 4]>;

#[derive(Debug)]
pub struct OffsetCache {
    zone: Tz,
    days: DashMap<i64, DayWindows>,
}

impl OffsetCache {
    pub fn new(zone: Tz) -> Self {
        Self {
            zone,
            days: DashMap::new(),
        }
    }

    #[inline]
    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// UTC offset in effect at `epoch_second`. Falls back to the raw zone
    /// offset (and ultimately 0) on any internal anomaly; never raises.
    pub fn offset_seconds(&self, epoch_second: i64) -> i32 {
        let day = epoch_second.div_euclid(SECONDS_PER_DAY);
        let windows = self
            .days
            .entry(day)
            .or_insert_with(|| Self::windows_for_day(self.zone, day));
        for w in windows.iter() {
            if epoch_second >= w.start && epoch_second < w.end {
                return w.offset_seconds;
            }
        }
        raw_offset(self.zone, epoch_second)
    }

    /// Cached window list for one epoch day (mainly for inspection).
    pub fn windows(&self, day: i64) -> DayWindows {
        self.days
            .entry(day)
            .or_insert_with(|| Self::windows_for_day(self.zone, day))
            .clone()
    }

    /// Walk the day once: start at the day's first offset, binary-search each
    /// transition boundary to the second. Zones change offset at most a
    /// handful of times per day.
    fn windows_for_day(zone: Tz, day: i64) -> DayWindows {
        let day_start = day.saturating_mul(SECONDS_PER_DAY);
        let day_end = day_start.saturating_add(SECONDS_PER_DAY);

        let mut windows = DayWindows::new();
        let mut cursor = day_start;
        let mut guard = 0;
        while cursor < day_end && guard < 16 {
            guard += 1;
            let offset = raw_offset(zone, cursor);
            let end = next_transition(zone, cursor, day_end, offset);
            windows.push(OffsetWindow {
                start: cursor,
                end,
                offset_seconds: offset,
            });
            cursor = end;
        }
        windows
    }
}

/// Smallest `t` in `(from, limit]` where the offset differs from
/// `offset_at_from`; `limit` when the offset is constant over the range.
fn next_transition(zone: Tz, from: i64, limit: i64, offset_at_from: i32) -> i64 {
    if raw_offset(zone, limit - 1) == offset_at_from && raw_offset(zone, from + (limit - from) / 2) == offset_at_from {
        // common case: no transition this day (probe the middle to catch
        // the rare double-transition day)
        return limit;
    }
    let mut lo = from; // offset(lo) == offset_at_from
    let mut hi = limit; // first candidate where a change may start
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if raw_offset(zone, mid) == offset_at_from {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}

fn raw_offset(zone: Tz, epoch_second: i64) -> i32 {
    match DateTime::from_timestamp(epoch_second, 0) {
        Some(utc) => zone
            .offset_from_utc_datetime(&utc.naive_utc())
            .fix()
            .local_minus_utc(),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day_of(epoch_second: i64) -> i64 {
        epoch_second.div_euclid(SECONDS_PER_DAY)
    }

    #[test]
    fn utc_has_a_single_zero_window() {
        let cache = OffsetCache::new(chrono_tz::UTC);
        let windows = cache.windows(20_000);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].offset_seconds, 0);
        assert_eq!(windows[0].end - windows[0].start, SECONDS_PER_DAY);
    }

    #[test]
    fn spring_forward_splits_the_day() {
        // America/New_York, 2026-03-08: EST (-5h) until 07:00 UTC, then EDT (-4h)
        let cache = OffsetCache::new(chrono_tz::America::New_York);
        let t_0630 = chrono::Utc
            .with_ymd_and_hms(2026, 3, 8, 6, 30, 0)
            .unwrap()
            .timestamp();
        let t_0730 = t_0630 + 3600;

        assert_eq!(cache.offset_seconds(t_0630), -5 * 3600);
        assert_eq!(cache.offset_seconds(t_0730), -4 * 3600);

        let windows = cache.windows(day_of(t_0630));
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].offset_seconds, -5 * 3600);
        assert_eq!(windows[1].offset_seconds, -4 * 3600);
        // the boundary is exactly 07:00 UTC (02:00 EST -> 03:00 EDT)
        let t_0700 = t_0630 + 1800;
        assert_eq!(windows[0].end, t_0700);
        assert_eq!(windows[1].start, t_0700);
    }

    #[test]
    fn fall_back_splits_the_day_too() {
        // 2026-11-01: EDT until 06:00 UTC, then EST
        let cache = OffsetCache::new(chrono_tz::America::New_York);
        let t = chrono::Utc
            .with_ymd_and_hms(2026, 11, 1, 5, 59, 59)
            .unwrap()
            .timestamp();
        assert_eq!(cache.offset_seconds(t), -4 * 3600);
        assert_eq!(cache.offset_seconds(t + 1), -5 * 3600);
    }

    #[test]
    fn lookups_are_idempotent_and_cached() {
        let cache = OffsetCache::new(chrono_tz::Europe::Berlin);
        let t = chrono::Utc
            .with_ymd_and_hms(2026, 6, 15, 12, 0, 0)
            .unwrap()
            .timestamp();
        let a = cache.offset_seconds(t);
        let b = cache.offset_seconds(t);
        assert_eq!(a, b);
        assert_eq!(a, 2 * 3600); // CEST
        assert_eq!(cache.days.len(), 1);
    }

    #[test]
    fn far_out_of_range_instants_fall_back_quietly() {
        let cache = OffsetCache::new(chrono_tz::America::New_York);
        // chrono cannot represent this instant; the fallback answers 0
        let t = i64::MAX - 10;
        let _ = cache.offset_seconds(t);
    }
}
