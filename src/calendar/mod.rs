pub mod holidays;
pub mod us_equities;

pub use us_equities::{UsEquitiesCalendar, US_EQUITIES};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ALWAYS_OPEN: &str = "24X7";

/// Trading session covering one exchange-local day
///
/// When `is_trading_day` is true, `session_open_utc <= session_close_utc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeSessionWindow {
    pub calendar_id: String,
    pub session_open_utc: DateTime<Utc>,
    pub session_close_utc: DateTime<Utc>,
    pub is_trading_day: bool,
    #[serde(default)]
    pub is_early_close: bool,
}

impl ExchangeSessionWindow {
    /// True when `at` is inside `[open, close)` of a trading day
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.is_trading_day && self.session_open_utc <= at && at < self.session_close_utc
    }

    pub fn duration(&self) -> Duration {
        self.session_close_utc - self.session_open_utc
    }
}

/// Calendar lookup contract
///
/// Returns `None` when the calendar id is unknown or the instant cannot be
/// mapped; there is no window value to misuse on failure.
pub trait ExchangeCalendarService: Send + Sync {
    fn try_get_session_window(
        &self,
        calendar_id: &str,
        at: DateTime<Utc>,
    ) -> Option<ExchangeSessionWindow>;
}

impl<T: ExchangeCalendarService + ?Sized> ExchangeCalendarService for Arc<T> {
    fn try_get_session_window(
        &self,
        calendar_id: &str,
        at: DateTime<Utc>,
    ) -> Option<ExchangeSessionWindow> {
        (**self).try_get_session_window(calendar_id, at)
    }
}

/// Round-the-clock calendar (crypto, tests)
///
/// Every UTC day is a trading day spanning midnight to midnight.
#[derive(Debug, Clone, Default)]
pub struct AlwaysOpenCalendar;

impl ExchangeCalendarService for AlwaysOpenCalendar {
    fn try_get_session_window(
        &self,
        calendar_id: &str,
        at: DateTime<Utc>,
    ) -> Option<ExchangeSessionWindow> {
        if !calendar_id.trim().eq_ignore_ascii_case(ALWAYS_OPEN) {
            return None;
        }

        let open = at.date_naive().and_hms_opt(0, 0, 0)?.and_utc();
        Some(ExchangeSessionWindow {
            calendar_id: ALWAYS_OPEN.to_string(),
            session_open_utc: open,
            session_close_utc: open + Duration::days(1),
            is_trading_day: true,
            is_early_close: false,
        })
    }
}

/// Fan-out over several calendars; the first one that resolves wins
#[derive(Clone, Default)]
pub struct CalendarRegistry {
    calendars: Vec<Arc<dyn ExchangeCalendarService>>,
}

impl CalendarRegistry {
    pub fn new() -> Self {
        Self { calendars: vec![] }
    }

    /// Registry with every built-in calendar
    pub fn with_builtin() -> Self {
        Self::new()
            .register(UsEquitiesCalendar::new())
            .register(AlwaysOpenCalendar)
    }

    pub fn register<C: ExchangeCalendarService + 'static>(mut self, calendar: C) -> Self {
        self.calendars.push(Arc::new(calendar));
        self
    }

    pub fn len(&self) -> usize {
        self.calendars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calendars.is_empty()
    }
}

impl ExchangeCalendarService for CalendarRegistry {
    fn try_get_session_window(
        &self,
        calendar_id: &str,
        at: DateTime<Utc>,
    ) -> Option<ExchangeSessionWindow> {
        self.calendars
            .iter()
            .find_map(|c| c.try_get_session_window(calendar_id, at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_always_open_window() {
        let window = AlwaysOpenCalendar
            .try_get_session_window("24x7", utc(2024, 1, 6, 15, 0))
            .unwrap();

        assert!(window.is_trading_day);
        assert_eq!(window.session_open_utc, utc(2024, 1, 6, 0, 0));
        assert_eq!(window.duration(), Duration::days(1));
        assert!(window.contains(utc(2024, 1, 6, 23, 59)));
        assert!(!window.contains(utc(2024, 1, 7, 0, 0)));
    }

    #[test]
    fn test_registry_dispatches_by_id() {
        let registry = CalendarRegistry::with_builtin();
        assert_eq!(registry.len(), 2);

        let saturday = utc(2024, 1, 6, 15, 0);
        let crypto = registry.try_get_session_window(ALWAYS_OPEN, saturday).unwrap();
        assert!(crypto.is_trading_day);

        let equities = registry.try_get_session_window(US_EQUITIES, saturday).unwrap();
        assert!(!equities.is_trading_day);

        assert!(registry.try_get_session_window("XETRA", saturday).is_none());
    }

    #[test]
    fn test_empty_registry_resolves_nothing() {
        let registry = CalendarRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.try_get_session_window(US_EQUITIES, utc(2024, 1, 8, 15, 0)).is_none());
    }

    #[test]
    fn test_non_trading_window_contains_nothing() {
        let window = ExchangeSessionWindow {
            calendar_id: "X".into(),
            session_open_utc: utc(2024, 1, 6, 14, 30),
            session_close_utc: utc(2024, 1, 6, 21, 0),
            is_trading_day: false,
            is_early_close: false,
        };
        assert!(!window.contains(utc(2024, 1, 6, 15, 0)));
    }
}
