//! Trading Session Calendar
//!
//! Pure time-window reasoning: given a reference instant, compute the
//! current trading session's open/close instants in the exchange time zone
//! (US equities, America/New_York, 09:30-16:00) converted to UTC. No state,
//! no I/O.
//!
//! The trading day is the most recent weekday on or before the reference
//! instant's calendar date in the exchange zone. Exchange holidays are not
//! modeled; a holiday session simply produces no bars.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

/// Exchange time zone for session boundary computation.
pub const MARKET_TZ: Tz = New_York;

/// One trading day's active window between market open and close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    /// Calendar date of the session in the exchange zone.
    pub trading_day: NaiveDate,
    /// Market open (09:30 exchange local) as a UTC instant.
    pub open: DateTime<Utc>,
    /// Market close (16:00 exchange local) as a UTC instant.
    pub close: DateTime<Utc>,
}

impl SessionWindow {
    /// Whether `instant` falls inside the session, bounds inclusive.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.open && instant <= self.close
    }

    /// Whether the session is over at `instant`.
    #[must_use]
    pub fn is_closed_at(&self, instant: DateTime<Utc>) -> bool {
        instant > self.close
    }
}

/// Compute the session window for the reference instant.
///
/// For a weekend reference the window is the preceding Friday's session;
/// for a weekday it is that same calendar day's session, whether or not
/// the reference falls inside the open/close bounds.
#[must_use]
pub fn session_window(reference: DateTime<Utc>) -> SessionWindow {
    window_for_day(trading_day_on_or_before(reference))
}

/// Compute the session window for a specific trading day.
#[must_use]
pub fn window_for_day(trading_day: NaiveDate) -> SessionWindow {
    let (open_time, close_time) = session_times();
    SessionWindow {
        trading_day,
        open: to_utc(trading_day, open_time),
        close: to_utc(trading_day, close_time),
    }
}

/// Most recent weekday (Mon-Fri) on or before the reference instant's
/// calendar date in the exchange zone.
#[must_use]
pub fn trading_day_on_or_before(reference: DateTime<Utc>) -> NaiveDate {
    let mut day = reference.with_timezone(&MARKET_TZ).date_naive();
    while !is_weekday(day) {
        day -= Duration::days(1);
    }
    day
}

/// The last `n` trading days up to and including the reference instant's
/// trading day, in ascending order.
#[must_use]
pub fn last_trading_days(reference: DateTime<Utc>, n: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(n);
    let mut day = trading_day_on_or_before(reference);
    while days.len() < n {
        if is_weekday(day) {
            days.push(day);
        }
        day -= Duration::days(1);
    }
    days.reverse();
    days
}

fn is_weekday(day: NaiveDate) -> bool {
    day.weekday().number_from_monday() <= 5
}

#[allow(clippy::expect_used)]
fn session_times() -> (NaiveTime, NaiveTime) {
    (
        NaiveTime::from_hms_opt(9, 30, 0).expect("09:30 is a valid time of day"),
        NaiveTime::from_hms_opt(16, 0, 0).expect("16:00 is a valid time of day"),
    )
}

fn to_utc(day: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let local = day.and_time(time);
    match MARKET_TZ.from_local_datetime(&local) {
        LocalResult::Single(instant) | LocalResult::Ambiguous(instant, _) => {
            instant.with_timezone(&Utc)
        }
        // DST transitions happen at 02:00 local, so 09:30/16:00 never fall
        // inside a gap. Treat the naive time as UTC if that ever changes.
        LocalResult::None => Utc.from_utc_datetime(&local),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn weekday_reference_resolves_to_same_day() {
        // Wednesday 2024-01-10, 10:00 New York == 15:00 UTC (EST).
        let window = session_window(utc(2024, 1, 10, 15, 0));

        assert_eq!(window.trading_day, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(window.open, utc(2024, 1, 10, 14, 30));
        assert_eq!(window.close, utc(2024, 1, 10, 21, 0));
    }

    #[test]
    fn saturday_resolves_to_preceding_friday() {
        // Saturday 2024-01-13.
        let window = session_window(utc(2024, 1, 13, 12, 0));
        assert_eq!(window.trading_day, NaiveDate::from_ymd_opt(2024, 1, 12).unwrap());
    }

    #[test]
    fn sunday_resolves_to_preceding_friday() {
        let window = session_window(utc(2024, 1, 14, 12, 0));
        assert_eq!(window.trading_day, NaiveDate::from_ymd_opt(2024, 1, 12).unwrap());
    }

    #[test]
    fn summer_session_uses_daylight_offset() {
        // Tuesday 2024-07-09, New York is UTC-4.
        let window = session_window(utc(2024, 7, 9, 15, 0));

        assert_eq!(window.open, utc(2024, 7, 9, 13, 30));
        assert_eq!(window.close, utc(2024, 7, 9, 20, 0));
    }

    #[test]
    fn contains_is_inclusive_of_bounds() {
        let window = session_window(utc(2024, 1, 10, 15, 0));

        assert!(window.contains(window.open));
        assert!(window.contains(window.close));
        assert!(!window.contains(window.open - Duration::seconds(1)));
        assert!(!window.contains(window.close + Duration::seconds(1)));
    }

    #[test]
    fn closed_only_after_close_instant() {
        let window = session_window(utc(2024, 1, 10, 15, 0));

        assert!(!window.is_closed_at(window.close));
        assert!(window.is_closed_at(window.close + Duration::seconds(1)));
    }

    #[test_case(2024, 1, 10, 5 => vec![(1, 4), (1, 5), (1, 8), (1, 9), (1, 10)]; "midweek skips the weekend")]
    #[test_case(2024, 1, 13, 2 => vec![(1, 11), (1, 12)]; "saturday ends on friday")]
    #[test_case(2024, 1, 8, 1 => vec![(1, 8)]; "single day")]
    fn last_trading_days_are_weekdays_ascending(
        y: i32,
        mo: u32,
        d: u32,
        n: usize,
    ) -> Vec<(u32, u32)> {
        last_trading_days(utc(y, mo, d, 18, 0), n)
            .into_iter()
            .map(|day| (day.month(), day.day()))
            .collect()
    }
}
