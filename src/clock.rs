//! Time source. Streaks, point windows and cache expiry read the current instant
//! through a `Clock` so they can be driven deterministically in tests.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day (UTC) of `now()`.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub type SharedClock = Arc<dyn Clock>;

#[cfg(test)]
pub use manual::ManualClock;


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_manual_clock_moves_only_on_demand() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let clock = ManualClock::at_date(day);
        assert_eq!(clock.today(), day);

        clock.advance(Duration::hours(23));
        assert_eq!(clock.today(), day);

        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }
}
