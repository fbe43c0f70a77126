//! Dashboard statistics over already-fetched records.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{Appointment, DialysisSession, Room};
use crate::store::AppointmentTotals;
use crate::scheduling::{list_in_window, resolve_window, CalendarWindow, Granularity, TimeWindow};

/// Length of the trailing appointment histogram.
pub const HISTORY_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_patients: i64,
    pub total_rooms: usize,
    pub available_rooms: usize,
    pub appointments_today: usize,
    pub upcoming_scheduled: i64,
    pub completed_appointments: i64,
    pub canceled_appointments: i64,
    pub dialysis_sessions_this_week: usize,
    pub appointments_last_7_days: Vec<DayBucket>,
}

/// Window covering the `days` calendar days ending with `now`'s day.
pub fn trailing_days(now: DateTime<Utc>, days: i64) -> CalendarWindow {
    let start = now - Duration::days(days.max(1) - 1);
    let from = resolve_window(start, Granularity::Day);
    let to = resolve_window(now, Granularity::Day);

    match (from.bounded(), to.bounded()) {
        (Some(f), Some(t)) => TimeWindow::new(f.from(), t.to())
            .map(CalendarWindow::Bounded)
            .unwrap_or(to),
        _ => to,
    }
}

/// One zero-filled bucket per day, oldest first, ending at `today`.
pub fn bucket_by_day<I>(instants: I, today: NaiveDate, days: i64) -> Vec<DayBucket>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let days = days.max(1);
    let first = today - Duration::days(days - 1);
    let mut buckets: Vec<DayBucket> = (0..days)
        .map(|offset| DayBucket {
            date: first + Duration::days(offset),
            count: 0,
        })
        .collect();

    for instant in instants {
        let offset = (instant.date_naive() - first).num_days();
        if (0..days).contains(&offset) {
            buckets[offset as usize].count += 1;
        }
    }
    buckets
}

/// Dashboard numbers from pre-aggregated totals and the records of the
/// trailing history window and the current week.
///
/// `recent` and `sessions` may hold extra records; each counter applies its
/// own window.
pub fn compute(
    now: DateTime<Utc>,
    total_patients: i64,
    rooms: &[Room],
    totals: AppointmentTotals,
    recent: &[Appointment],
    sessions: &[DialysisSession],
) -> DashboardStats {
    let today = resolve_window(now, Granularity::Day);
    let this_week = resolve_window(now, Granularity::Week);
    let trailing = trailing_days(now, HISTORY_DAYS);

    let history = list_in_window(recent, &[], &trailing);

    DashboardStats {
        total_patients,
        total_rooms: rooms.len(),
        available_rooms: rooms.iter().filter(|r| r.is_available).count(),
        appointments_today: list_in_window(recent, &[], &today).len(),
        upcoming_scheduled: totals.upcoming_scheduled,
        completed_appointments: totals.completed,
        canceled_appointments: totals.canceled,
        dialysis_sessions_this_week: list_in_window(sessions, &[], &this_week).len(),
        appointments_last_7_days: bucket_by_day(
            history.iter().map(|a| a.appointment_date),
            now.date_naive(),
            HISTORY_DAYS,
        ),
    }
}
