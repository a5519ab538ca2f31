//! Wall clock in the users' time zone

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Source of "now" for date resolution and scheduling.
pub trait Clock: Send + Sync {
    /// Local date and time in the configured zone.
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(chrono_tz::America::Sao_Paulo)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let utc: DateTime<Utc> = Utc::now();
        utc.with_timezone(&self.tz).naive_local()
    }
}

/// Frozen clock for tests and replays.
pub struct FixedClock {
    now: NaiveDateTime,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    /// Noon on `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self {
            now: date.and_hms_opt(12, 0, 0).unwrap_or_default(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_reports_given_day() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let clock = FixedClock::on(day);
        assert_eq!(clock.today(), day);
    }
}
