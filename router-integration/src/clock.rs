//! The exchange clock. B3 trades on Taipei-style wall-clock scheduling
//! windows expressed against `Asia/Taipei` (UTC+8) in the source system this
//! router descends from; rather than pull in a full tz database dependency
//! for a single fixed offset, the offset is hard-coded here, matching the
//! original `get_tpe_datetime()` helper.

use chrono::{DateTime, FixedOffset, Utc};

const TPE_OFFSET_SECONDS: i32 = 8 * 3600;

/// Anything that can answer "what time is it", so tests can inject a fixed
/// instant instead of reading the real wall clock.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_utc(&self) -> DateTime<Utc>;

    fn now_local(&self) -> DateTime<FixedOffset> {
        self.now_utc().with_timezone(&tpe_offset())
    }
}

fn tpe_offset() -> FixedOffset {
    FixedOffset::east_opt(TPE_OFFSET_SECONDS).expect("fixed offset is always valid")
}

/// [`Clock`] backed by the real OS wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[derive(Debug)]
    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now_utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn local_time_is_eight_hours_ahead_of_utc() {
        let utc = DateTime::parse_from_rfc3339("2026-07-26T01:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc);
        let clock = FixedClock(utc);
        assert_eq!(clock.now_local().hour(), 9);
    }
}
