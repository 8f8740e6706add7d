use super::holidays::{is_us_equities_early_close, is_us_equities_holiday, is_weekend};
use super::{ExchangeCalendarService, ExchangeSessionWindow};
use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

pub const US_EQUITIES: &str = "US-EQUITIES";

/// NYSE/Nasdaq regular-hours calendar
///
/// Session: 09:30-16:00 America/New_York, 13:00 close on early-close days.
/// Daylight saving is handled by the tz database, so the UTC window shifts
/// by an hour across DST transitions.
#[derive(Debug, Clone)]
pub struct UsEquitiesCalendar {
    zone: Tz,
    open: NaiveTime,
    close: NaiveTime,
    early_close: NaiveTime,
}

impl UsEquitiesCalendar {
    pub fn new() -> Self {
        Self {
            zone: New_York,
            open: hm(9, 30),
            close: hm(16, 0),
            early_close: hm(13, 0),
        }
    }

    /// Session window for an exchange-local date
    pub fn session_for_date(&self, local_date: NaiveDate) -> ExchangeSessionWindow {
        let is_trading_day = !is_weekend(local_date) && !is_us_equities_holiday(local_date);
        let is_early_close = is_trading_day && is_us_equities_early_close(local_date);
        let close = if is_early_close { self.early_close } else { self.close };

        ExchangeSessionWindow {
            calendar_id: US_EQUITIES.to_string(),
            session_open_utc: self.local_to_utc(local_date, self.open),
            session_close_utc: self.local_to_utc(local_date, close),
            is_trading_day,
            is_early_close,
        }
    }

    /// Whether the regular session is live at `at`
    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        let local_date = at.with_timezone(&self.zone).date_naive();
        self.session_for_date(local_date).contains(at)
    }

    fn local_to_utc(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let naive = date.and_time(time);
        match self.zone.from_local_datetime(&naive) {
            LocalResult::Single(t) => t.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            // Session times never fall in the 02:00 spring-forward gap; read
            // the wall clock as standard time if a custom schedule ever does.
            LocalResult::None => {
                let standard_offset_hours = 5;
                (naive + chrono::Duration::hours(standard_offset_hours)).and_utc()
            }
        }
    }
}

impl Default for UsEquitiesCalendar {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeCalendarService for UsEquitiesCalendar {
    fn try_get_session_window(
        &self,
        calendar_id: &str,
        at: DateTime<Utc>,
    ) -> Option<ExchangeSessionWindow> {
        if !calendar_id.trim().eq_ignore_ascii_case(US_EQUITIES) {
            return None;
        }

        let local_date = at.with_timezone(&self.zone).date_naive();
        Some(self.session_for_date(local_date))
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}
