//! Room availability decisions.
//!
//! Pure decision function over bookings the caller has already fetched.
//! It never errors: a missing room is the caller's precondition, and an
//! empty booking list simply means the room is free.
//!
//! The check is not atomic with the insert that follows it. Two requests
//! for the same slot can both observe a free room before either commits.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::overlap::Interval;
use super::window::{resolve_window, Granularity};
use crate::models::{Appointment, DialysisSession, Room};

/// Anything with a start instant and a duration that can occupy a room.
pub trait Bookable {
    fn booking_id(&self) -> Uuid;
    fn starts_at(&self) -> DateTime<Utc>;
    fn duration_minutes(&self) -> i32;

    /// Whether this booking currently holds its slot.
    fn is_blocking(&self) -> bool;

    fn interval(&self) -> Interval {
        Interval::from_minutes(self.starts_at(), self.duration_minutes())
    }
}

impl Bookable for Appointment {
    fn booking_id(&self) -> Uuid {
        self.appointment_id
    }

    fn starts_at(&self) -> DateTime<Utc> {
        self.appointment_date
    }

    fn duration_minutes(&self) -> i32 {
        self.estimated_duration_in_minutes
    }

    fn is_blocking(&self) -> bool {
        self.status.blocks_room()
    }
}

/// Sessions without a recorded duration occupy no time.
impl Bookable for DialysisSession {
    fn booking_id(&self) -> Uuid {
        self.session_id
    }

    fn starts_at(&self) -> DateTime<Utc> {
        self.session_date
    }

    fn duration_minutes(&self) -> i32 {
        self.duration_minutes.unwrap_or(0)
    }

    fn is_blocking(&self) -> bool {
        !self.completed
    }
}

/// The slot a caller wants to book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub start: DateTime<Utc>,
    pub duration_minutes: i32,
}

impl Candidate {
    pub fn new(start: DateTime<Utc>, duration_minutes: i32) -> Self {
        Self {
            start,
            duration_minutes,
        }
    }

    pub fn interval(&self) -> Interval {
        Interval::from_minutes(self.start, self.duration_minutes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub available: bool,
    pub conflicting_appointment_id: Option<Uuid>,
}

impl Availability {
    pub fn free() -> Self {
        Self {
            available: true,
            conflicting_appointment_id: None,
        }
    }

    pub fn closed() -> Self {
        Self {
            available: false,
            conflicting_appointment_id: None,
        }
    }

    pub fn conflict(with: Uuid) -> Self {
        Self {
            available: false,
            conflicting_appointment_id: Some(with),
        }
    }
}

/// Decides whether `room` can take `candidate`.
///
/// 1. A room marked unavailable rejects everything.
/// 2. Only blocking bookings on the candidate's calendar day are considered.
/// 3. The first overlapping booking in `existing` order is reported.
pub fn check_availability<B: Bookable>(
    room: &Room,
    candidate: &Candidate,
    existing: &[B],
) -> Availability {
    if !room.is_available {
        return Availability::closed();
    }

    let wanted = candidate.interval();
    let same_day = resolve_window(candidate.start, Granularity::Day);

    existing
        .iter()
        .filter(|b| b.is_blocking() && same_day.contains(b.starts_at()))
        .find(|b| wanted.overlaps(&b.interval()))
        .map(|b| Availability::conflict(b.booking_id()))
        .unwrap_or_else(Availability::free)
}
