use crate::error::{StrategyError, StrategyResult};
use chrono::{DateTime, Utc};

/// Monotonic clock driven by replayed timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayClock {
    now: DateTime<Utc>,
}

impl ReplayClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: start }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Move forward to `timestamp`; equal timestamps are allowed
    pub fn advance_to(&mut self, timestamp: DateTime<Utc>) -> StrategyResult<DateTime<Utc>> {
        if timestamp < self.now {
            return Err(StrategyError::ClockRegression {
                current: self.now,
                requested: timestamp,
            });
        }
        self.now = timestamp;
        Ok(self.now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_advance_forward_and_same_instant() {
        let start = Utc.with_ymd_and_hms(2024, 3, 12, 14, 30, 0).unwrap();
        let mut clock = ReplayClock::new(start);

        assert_eq!(clock.advance_to(start).unwrap(), start);
        let later = start + Duration::seconds(5);
        clock.advance_to(later).unwrap();
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn test_regression_is_rejected() {
        let start = Utc.with_ymd_and_hms(2024, 3, 12, 14, 30, 0).unwrap();
        let mut clock = ReplayClock::new(start);

        let err = clock.advance_to(start - Duration::seconds(1)).unwrap_err();
        assert!(matches!(err, StrategyError::ClockRegression { .. }));
        assert_eq!(clock.now(), start);
    }
}
