//! Rule-based US equities holiday calendar
//!
//! Pure date arithmetic: no tables, no IO. Every rule is expressed in terms of
//! the exchange-local civil date.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Full-day US equities market holidays observed in `year`
pub fn us_equities_holidays(year: i32) -> Vec<NaiveDate> {
    [
        ymd(year, 1, 1).map(observe),
        nth_weekday_of_month(year, 1, Weekday::Mon, 3),  // MLK Day
        nth_weekday_of_month(year, 2, Weekday::Mon, 3),  // Presidents' Day
        good_friday(year),
        last_weekday_of_month(year, 5, Weekday::Mon),    // Memorial Day
        ymd(year, 6, 19).map(observe),                   // Juneteenth
        ymd(year, 7, 4).map(observe),
        nth_weekday_of_month(year, 9, Weekday::Mon, 1),  // Labor Day
        thanksgiving(year),
        ymd(year, 12, 25).map(observe),
    ]
    .into_iter()
    .flatten()
    .collect()
}

pub fn is_us_equities_holiday(date: NaiveDate) -> bool {
    us_equities_holidays(date.year()).contains(&date)
}

/// 13:00 ET early-close sessions
///
/// - Friday after Thanksgiving
/// - Christmas Eve on a weekday that is not itself a holiday
/// - July 3rd (Mon-Thu) when Independence Day falls Tue-Fri
pub fn is_us_equities_early_close(date: NaiveDate) -> bool {
    if let Some(thanksgiving) = thanksgiving(date.year()) {
        let day_after = thanksgiving + Duration::days(1);
        if date == day_after && date.weekday() == Weekday::Fri {
            return true;
        }
    }

    if date.month() == 12 && date.day() == 24 && !is_weekend(date) {
        return !is_us_equities_holiday(date);
    }

    if date.month() == 7 && date.day() == 3 && date.weekday().num_days_from_monday() <= 3 {
        if let Some(independence_day) = ymd(date.year(), 7, 4) {
            let dow = independence_day.weekday().num_days_from_monday();
            return (1..=4).contains(&dow);
        }
    }

    false
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Saturday holidays shift to Friday, Sunday holidays to Monday
pub fn observe(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

pub fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, nth: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, nth)
}

pub fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        ymd(year + 1, 1, 1)?
    } else {
        ymd(year, month + 1, 1)?
    };
    let last = first_of_next - Duration::days(1);
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    Some(last - Duration::days(back as i64))
}

pub fn thanksgiving(year: i32) -> Option<NaiveDate> {
    nth_weekday_of_month(year, 11, Weekday::Thu, 4)
}

pub fn good_friday(year: i32) -> Option<NaiveDate> {
    western_easter_sunday(year).map(|easter| easter - Duration::days(2))
}

/// Gregorian computus (anonymous algorithm)
pub fn western_easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    ymd(year, month as u32, day as u32)
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_easter_dates() {
        assert_eq!(western_easter_sunday(2024), Some(d(2024, 3, 31)));
        assert_eq!(western_easter_sunday(2025), Some(d(2025, 4, 20)));
        assert_eq!(western_easter_sunday(2026), Some(d(2026, 4, 5)));
        assert_eq!(good_friday(2023), Some(d(2023, 4, 7)));
    }

    #[test]
    fn test_holidays_match_published_2024_schedule() {
        let expected = vec![
            d(2024, 1, 1),
            d(2024, 1, 15),
            d(2024, 2, 19),
            d(2024, 3, 29),
            d(2024, 5, 27),
            d(2024, 6, 19),
            d(2024, 7, 4),
            d(2024, 9, 2),
            d(2024, 11, 28),
            d(2024, 12, 25),
        ];
        assert_eq!(us_equities_holidays(2024), expected);
    }

    #[test]
    fn test_observed_holidays() {
        // July 4th 2026 is a Saturday
        assert!(is_us_equities_holiday(d(2026, 7, 3)));
        assert!(!is_us_equities_holiday(d(2026, 7, 4)));
        // Juneteenth 2022 fell on a Sunday
        assert!(is_us_equities_holiday(d(2022, 6, 20)));
    }

    #[test]
    fn test_last_weekday_of_month() {
        assert_eq!(last_weekday_of_month(2025, 5, Weekday::Mon), Some(d(2025, 5, 26)));
        assert_eq!(last_weekday_of_month(2024, 12, Weekday::Tue), Some(d(2024, 12, 31)));
    }

    #[test]
    fn test_early_closes() {
        assert!(is_us_equities_early_close(d(2024, 11, 29)));
        assert!(is_us_equities_early_close(d(2024, 12, 24)));
        assert!(is_us_equities_early_close(d(2024, 7, 3)));
        // July 4th 2025 is a Friday, July 3rd a Thursday
        assert!(is_us_equities_early_close(d(2025, 7, 3)));
        // July 4th 2021 was a Sunday
        assert!(!is_us_equities_early_close(d(2021, 7, 3)));
        assert!(!is_us_equities_early_close(d(2024, 3, 12)));
    }
}
