//! Wall-clock source for the recorder.
//!
//! Retention windows, weekly/monthly counts and calendar-day streaks all
//! depend on "now" and on the user's local date, so both are injected.

use std::cell::Cell;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, Utc};

pub trait WallClock {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day of `at` in the user's time zone.
    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate;
}

/// The host clock and time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&Local).date_naive()
    }
}

/// A settable clock in a fixed time zone.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
    offset: FixedOffset,
}

impl FixedClock {
    /// Clock at `now` in UTC.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_offset(now, Utc.fix())
    }

    pub fn with_offset(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now: Cell::new(now),
            offset,
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl WallClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }
}

impl<T: WallClock + ?Sized> WallClock for &T {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        (**self).local_date(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_uses_its_offset_for_dates() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 23, 30, 0).unwrap();
        let utc = FixedClock::new(at);
        let tokyo = FixedClock::with_offset(at, FixedOffset::east_opt(9 * 3600).unwrap());
        assert_eq!(utc.local_date(at), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(tokyo.local_date(at), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn fixed_clock_advances() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(at);
        clock.advance(chrono::Duration::days(2));
        assert_eq!(clock.now(), at + chrono::Duration::days(2));
    }
}
