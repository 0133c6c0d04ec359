//! Trading-session scheduling predicates.
//!
//! Ported from `is_signal_time` / `is_before_market_time` / `is_sync_time` /
//! `is_trade_time` / `is_week_date` / `get_next_schedule_time`. All windows
//! are expressed in exchange-local time (see [`crate::clock`]) and each has a
//! `debug` escape hatch that widens the window for local testing, matching
//! the original's `Config.DEBUG` bypass.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Timelike};

/// Configurable trading-session boundaries. Defaults match the original
/// B3 cash-equity session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindows {
    pub market_open: NaiveTime,
    pub market_close: NaiveTime,
    pub signal_start: NaiveTime,
    pub signal_end: NaiveTime,
    pub sync_interval_secs: u32,
    pub snapshot_interval_secs: u32,
    pub debug: bool,
}

impl Default for ScheduleWindows {
    fn default() -> Self {
        Self {
            market_open: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            market_close: NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
            signal_start: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            signal_end: NaiveTime::from_hms_opt(13, 25, 0).unwrap(),
            sync_interval_secs: 5,
            snapshot_interval_secs: 3,
            debug: false,
        }
    }
}

impl ScheduleWindows {
    /// `true` on Monday through Friday. Holiday exclusion is looked up from
    /// the TradingDates cache, not decided here.
    pub fn is_week_date(&self, now: DateTime<FixedOffset>) -> bool {
        if self.debug {
            return true;
        }
        !matches!(now.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
    }

    /// Window during which strategy signal files are accepted.
    pub fn is_signal_time(&self, now: DateTime<FixedOffset>) -> bool {
        if self.debug {
            return true;
        }
        let t = now.time();
        self.is_week_date(now) && t >= self.signal_start && t <= self.signal_end
    }

    /// Strictly before the market opens.
    pub fn is_before_market_time(&self, now: DateTime<FixedOffset>) -> bool {
        if self.debug {
            return true;
        }
        now.time() < self.market_open
    }

    /// Window during which orders may be transmitted to the broker.
    pub fn is_trade_time(&self, now: DateTime<FixedOffset>) -> bool {
        if self.debug {
            return true;
        }
        let t = now.time();
        self.is_week_date(now) && t >= self.market_open && t <= self.market_close
    }

    /// `true` every `sync_interval_secs` seconds, used to gate the engine's
    /// periodic contract/position reconciliation.
    pub fn is_sync_time(&self, now: DateTime<FixedOffset>) -> bool {
        if self.debug {
            return true;
        }
        now.second() % self.sync_interval_secs == 0
    }

    /// `true` every `snapshot_interval_secs` seconds during the trade
    /// window, used to gate the exit handler's quote refresh.
    pub fn is_snapshot_time(&self, now: DateTime<FixedOffset>) -> bool {
        if self.debug {
            return true;
        }
        self.is_trade_time(now) && now.second() % self.snapshot_interval_secs == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
        // 2026-07-27 is a Monday.
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        tz.with_ymd_and_hms(2026, 7, 27, h, m, s).unwrap()
    }

    use chrono::TimeZone;

    #[test]
    fn signal_window_is_inclusive() {
        let w = ScheduleWindows::default();
        assert!(w.is_signal_time(at(8, 30, 0)));
        assert!(w.is_signal_time(at(13, 25, 0)));
        assert!(!w.is_signal_time(at(8, 29, 59)));
        assert!(!w.is_signal_time(at(13, 25, 1)));
    }

    #[test]
    fn trade_window_matches_market_hours() {
        let w = ScheduleWindows::default();
        assert!(!w.is_trade_time(at(8, 59, 59)));
        assert!(w.is_trade_time(at(9, 0, 0)));
        assert!(w.is_trade_time(at(13, 30, 0)));
        assert!(!w.is_trade_time(at(13, 30, 1)));
    }

    #[test]
    fn snapshot_window_requires_both_trade_time_and_interval() {
        let w = ScheduleWindows { snapshot_interval_secs: 3, ..ScheduleWindows::default() };
        assert!(w.is_snapshot_time(at(9, 0, 3)));
        assert!(!w.is_snapshot_time(at(9, 0, 1)));
        assert!(!w.is_snapshot_time(at(8, 59, 3)));
    }

    #[test]
    fn debug_mode_bypasses_every_window() {
        let w = ScheduleWindows { debug: true, ..ScheduleWindows::default() };
        assert!(w.is_signal_time(at(3, 0, 0)));
        assert!(w.is_trade_time(at(3, 0, 0)));
        assert!(w.is_before_market_time(at(23, 0, 0)));
    }
}
