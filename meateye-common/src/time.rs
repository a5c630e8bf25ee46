//! Clock abstraction and calendar helpers
//!
//! Scheduling code never reads the ambient system time directly. Every
//! component that compares against "now" receives a [`Clock`], so tests can
//! pin and advance time deterministically.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use std::sync::{Arc, RwLock};

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by `Utc::now()`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replay
///
/// Clones share the same underlying instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(RwLock::new(start)),
        }
    }

    /// Jump to an absolute instant
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = instant;
    }

    /// Move forward by `delta`
    pub fn advance(&self, delta: Duration) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fixed UTC offset from whole hours, clamped to the valid range
pub fn offset_from_hours(hours: i32) -> FixedOffset {
    let hours = hours.clamp(-23, 23);
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}

/// Calendar date of `instant` in the given offset
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// The instant at `hour`:00 local time on `date`
pub fn local_instant(date: NaiveDate, hour: u32, offset: FixedOffset) -> DateTime<Utc> {
    let naive = date.and_hms_opt(hour.min(23), 0, 0).unwrap_or_else(|| date.and_time(NaiveTime::MIN));
    match offset.from_local_datetime(&naive).single() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&naive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kst() -> FixedOffset {
        offset_from_hours(9)
    }

    #[test]
    fn test_system_clock_returns_recent_timestamp() {
        let timestamp = SystemClock.now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }

    #[test]
    fn test_manual_clock_set_and_advance() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::hours(5));
        assert_eq!(clock.now(), start + Duration::hours(5));

        let later = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
        clock.set(later);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        let other = clock.clone();
        clock.advance(Duration::days(1));
        assert_eq!(other.now(), clock.now());
    }

    #[test]
    fn test_local_date_crosses_midnight() {
        // 2026-03-01 20:00 UTC is already 2026-03-02 in KST
        let instant = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        assert_eq!(local_date(instant, kst()), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(local_date(instant, offset_from_hours(0)), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn test_local_instant_applies_offset() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let instant = local_instant(date, 9, kst());
        assert_eq!(instant, Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_offset_is_clamped() {
        assert_eq!(offset_from_hours(40).local_minus_utc(), 23 * 3600);
        assert_eq!(offset_from_hours(-40).local_minus_utc(), -23 * 3600);
    }
}
