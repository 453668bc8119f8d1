//! Time sources.
//!
//! Every comparison in calcron happens on the naive local wall clock of the
//! process. Instants coming from the calendar are resolved to local time and
//! then stripped of their offset, which is only approximate around DST
//! transitions.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, Utc};

pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Resolve an instant to the local wall clock and drop the offset.
    fn wall_clock(&self, instant: DateTime<Utc>) -> NaiveDateTime;

    fn local_now(&self) -> NaiveDateTime {
        self.wall_clock(self.now())
    }
}

/// The machine's real clock and timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn wall_clock(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&Local).naive_local()
    }
}

/// A clock pinned to one instant in a fixed-offset zone.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        FixedClock { now, offset }
    }

    /// A UTC clock whose wall clock reads `local`.
    pub fn at(local: NaiveDateTime) -> Self {
        FixedClock {
            now: local.and_utc(),
            offset: Utc.fix(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn wall_clock(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn fixed_clock_applies_offset() {
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        let clock = FixedClock::new(now, FixedOffset::east_opt(3600).unwrap());

        let expected = NaiveDate::from_ymd_opt(2026, 1, 10)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap();
        assert_eq!(clock.local_now(), expected);
    }
}
