//! Calendar windows.
//!
//! A window is an inclusive `[from, to]` range of instants derived from a
//! reference instant and a granularity. All arithmetic happens in UTC, the
//! single zone used by the whole server.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Width of a calendar window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
    All,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
            Granularity::All => "all",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGranularity(pub String);

impl fmt::Display for UnknownGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown view '{}', expected day|week|month|year|all", self.0)
    }
}

impl FromStr for Granularity {
    type Err = UnknownGranularity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            "year" => Ok(Granularity::Year),
            "all" => Ok(Granularity::All),
            _ => Err(UnknownGranularity(s.to_string())),
        }
    }
}

/// Inclusive range of instants. `from <= to` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl TimeWindow {
    /// Returns `None` when `from > to`.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Option<Self> {
        (from <= to).then_some(Self { from, to })
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    /// Inclusive on both ends.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant <= self.to
    }

    /// Window covering the whole dates `first..=last`.
    fn spanning_dates(first: NaiveDate, last: NaiveDate) -> Self {
        let from = start_of(first);
        let to = last
            .and_hms_milli_opt(23, 59, 59, 999)
            .map(|end| end.and_utc())
            .unwrap_or(from);
        Self { from, to }
    }
}

/// A resolved window: either bounded, or unbounded for `Granularity::All`.
///
/// Unbounded windows carry no sentinel timestamps; callers skip filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarWindow {
    Bounded(TimeWindow),
    Unbounded,
}

impl CalendarWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        match self {
            CalendarWindow::Bounded(w) => w.contains(instant),
            CalendarWindow::Unbounded => true,
        }
    }

    /// `(from, to)` ready to bind as nullable query parameters.
    pub fn bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match self {
            CalendarWindow::Bounded(w) => (Some(w.from), Some(w.to)),
            CalendarWindow::Unbounded => (None, None),
        }
    }

    pub fn bounded(&self) -> Option<&TimeWindow> {
        match self {
            CalendarWindow::Bounded(w) => Some(w),
            CalendarWindow::Unbounded => None,
        }
    }
}

/// Wire shape of a window: ISO-8601 instants, `null` when unbounded.
#[derive(Debug, Clone, Serialize)]
pub struct WindowBounds {
    pub view: Granularity,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl WindowBounds {
    pub fn new(view: Granularity, window: &CalendarWindow) -> Self {
        let (from, to) = window.bounds();
        Self { view, from, to }
    }
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Resolves the calendar window containing `reference`.
///
/// Weeks run Monday 00:00:00.000 through Sunday 23:59:59.999.
pub fn resolve_window(reference: DateTime<Utc>, granularity: Granularity) -> CalendarWindow {
    let date = reference.date_naive();

    let window = match granularity {
        Granularity::All => return CalendarWindow::Unbounded,
        Granularity::Day => TimeWindow::spanning_dates(date, date),
        Granularity::Week => {
            let monday = date
                .checked_sub_days(Days::new(date.weekday().num_days_from_monday() as u64))
                .unwrap_or(NaiveDate::MIN);
            let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX);
            TimeWindow::spanning_dates(monday, sunday)
        }
        Granularity::Month => {
            let first = date.with_day(1).unwrap_or(date);
            let last = first
                .checked_add_months(Months::new(1))
                .and_then(|next| next.pred_opt())
                .unwrap_or(NaiveDate::MAX);
            TimeWindow::spanning_dates(first, last)
        }
        Granularity::Year => {
            let first = date.with_ordinal(1).unwrap_or(date);
            let last = first
                .checked_add_months(Months::new(12))
                .and_then(|next| next.pred_opt())
                .unwrap_or(NaiveDate::MAX);
            TimeWindow::spanning_dates(first, last)
        }
    };

    CalendarWindow::Bounded(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Timelike, Weekday};

    const ALL_BOUNDED: [Granularity; 4] = [
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
        Granularity::Year,
    ];

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    fn bounded(w: CalendarWindow) -> TimeWindow {
        *w.bounded().expect("expected bounded window")
    }

    fn references() -> Vec<DateTime<Utc>> {
        vec![
            at(2024, 6, 3, 0, 0),
            at(2024, 6, 5, 13, 37),
            at(2024, 6, 9, 23, 59) + Duration::milliseconds(59_999),
            at(2024, 2, 29, 12, 0),
            at(2023, 12, 31, 23, 0),
            at(2025, 1, 1, 0, 0),
        ]
    }

    #[test]
    fn test_parse_granularity() {
        assert_eq!("day".parse::<Granularity>(), Ok(Granularity::Day));
        assert_eq!(" Week ".parse::<Granularity>(), Ok(Granularity::Week));
        assert_eq!("ALL".parse::<Granularity>(), Ok(Granularity::All));
        assert!("fortnight".parse::<Granularity>().is_err());
    }

    #[test]
    fn test_window_ordering_and_containment() {
        for reference in references() {
            for g in ALL_BOUNDED {
                let w = bounded(resolve_window(reference, g));
                assert!(w.from() <= w.to(), "{g} window inverted for {reference}");
                assert!(w.contains(reference), "{g} window misses {reference}");
            }
        }
    }

    #[test]
    fn test_week_starts_on_monday() {
        for offset in 0..7 {
            let reference = at(2024, 6, 3, 8, 0) + Duration::days(offset);
            let w = bounded(resolve_window(reference, Granularity::Week));
            assert_eq!(w.from().weekday(), Weekday::Mon);
            assert_eq!(w.from(), at(2024, 6, 3, 0, 0));
            assert_eq!(w.to().weekday(), Weekday::Sun);
            assert_eq!(w.to(), at(2024, 6, 10, 0, 0) - Duration::milliseconds(1));
        }
    }

    #[test]
    fn test_day_window_bounds() {
        let w = bounded(resolve_window(at(2024, 6, 10, 9, 15), Granularity::Day));
        assert_eq!(w.from(), at(2024, 6, 10, 0, 0));
        assert_eq!(w.to().hour(), 23);
        assert_eq!(w.to().minute(), 59);
        assert_eq!(w.to().second(), 59);
        assert_eq!(w.to().timestamp_subsec_millis(), 999);
    }

    #[test]
    fn test_month_window_handles_lengths() {
        let feb = bounded(resolve_window(at(2024, 2, 10, 0, 0), Granularity::Month));
        assert_eq!(feb.from(), at(2024, 2, 1, 0, 0));
        assert_eq!(feb.to(), at(2024, 3, 1, 0, 0) - Duration::milliseconds(1));

        let dec = bounded(resolve_window(at(2023, 12, 31, 22, 0), Granularity::Month));
        assert_eq!(dec.from(), at(2023, 12, 1, 0, 0));
        assert_eq!(dec.to(), at(2024, 1, 1, 0, 0) - Duration::milliseconds(1));
    }

    #[test]
    fn test_year_window() {
        let w = bounded(resolve_window(at(2024, 7, 4, 12, 0), Granularity::Year));
        assert_eq!(w.from(), at(2024, 1, 1, 0, 0));
        assert_eq!(w.to(), at(2025, 1, 1, 0, 0) - Duration::milliseconds(1));
    }

    #[test]
    fn test_all_is_unbounded() {
        let w = resolve_window(at(2024, 7, 4, 12, 0), Granularity::All);
        assert_eq!(w, CalendarWindow::Unbounded);
        assert_eq!(w.bounds(), (None, None));
        assert!(w.contains(at(1970, 1, 1, 0, 0)));
    }

    #[test]
    fn test_time_window_rejects_inverted_bounds() {
        assert!(TimeWindow::new(at(2024, 1, 2, 0, 0), at(2024, 1, 1, 0, 0)).is_none());
        assert!(TimeWindow::new(at(2024, 1, 1, 0, 0), at(2024, 1, 1, 0, 0)).is_some());
    }

    #[test]
    fn test_window_bounds_serialize_null_when_unbounded() {
        let json = serde_json::to_value(WindowBounds::new(
            Granularity::All,
            &CalendarWindow::Unbounded,
        ))
        .unwrap();
        assert_eq!(json["view"], "all");
        assert!(json["from"].is_null());
        assert!(json["to"].is_null());
    }

    #[test]
    fn test_windows_at_the_calendar_edges_stay_ordered() {
        for reference in [DateTime::<Utc>::MAX_UTC, DateTime::<Utc>::MIN_UTC] {
            for g in ALL_BOUNDED {
                let w = bounded(resolve_window(reference, g));
                assert!(w.from() <= w.to(), "{g:?} at {reference}");
            }
        }
    }
}
