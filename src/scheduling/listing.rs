//! "Entities starting inside a window" for appointments, dialysis sessions
//! and statistics.
//!
//! Listing is inclusive on both window ends, unlike booking conflicts which
//! treat the end instant as exclusive.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::window::CalendarWindow;
use crate::models::{Appointment, DialysisSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerField {
    Patient,
    Doctor,
    Room,
}

/// Keep only entities whose `field` equals `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerFilter {
    pub field: OwnerField,
    pub value: Uuid,
}

impl OwnerFilter {
    pub fn new(field: OwnerField, value: Uuid) -> Self {
        Self { field, value }
    }

    /// One filter per supplied patient, doctor and room query parameter.
    pub fn from_params(
        patient_id: Option<Uuid>,
        doctor_id: Option<Uuid>,
        room_id: Option<Uuid>,
    ) -> Vec<Self> {
        [
            (OwnerField::Patient, patient_id),
            (OwnerField::Doctor, doctor_id),
            (OwnerField::Room, room_id),
        ]
        .into_iter()
        .filter_map(|(field, id)| id.map(|id| Self::new(field, id)))
        .collect()
    }

    pub fn matches<T: Scheduled>(&self, item: &T) -> bool {
        item.owner(self.field) == Some(self.value)
    }
}

/// An entity placed on the calendar.
pub trait Scheduled {
    fn scheduled_at(&self) -> DateTime<Utc>;

    /// The owning id for `field`, or `None` when this entity has no such owner.
    fn owner(&self, field: OwnerField) -> Option<Uuid>;
}

impl Scheduled for Appointment {
    fn scheduled_at(&self) -> DateTime<Utc> {
        self.appointment_date
    }

    fn owner(&self, field: OwnerField) -> Option<Uuid> {
        match field {
            OwnerField::Patient => Some(self.patient_id),
            OwnerField::Doctor => Some(self.doctor_id),
            OwnerField::Room => Some(self.room_id),
        }
    }
}

impl Scheduled for DialysisSession {
    fn scheduled_at(&self) -> DateTime<Utc> {
        self.session_date
    }

    fn owner(&self, field: OwnerField) -> Option<Uuid> {
        match field {
            OwnerField::Patient => Some(self.dialysis_patient_id),
            OwnerField::Doctor | OwnerField::Room => None,
        }
    }
}

impl<T: Scheduled> Scheduled for &T {
    fn scheduled_at(&self) -> DateTime<Utc> {
        (**self).scheduled_at()
    }

    fn owner(&self, field: OwnerField) -> Option<Uuid> {
        (**self).owner(field)
    }
}

/// Entities starting inside `window` that match every filter in `owners`.
///
/// Input order is preserved. An empty `owners` keeps everything in the window.
pub fn list_in_window<T, I>(items: I, owners: &[OwnerFilter], window: &CalendarWindow) -> Vec<T>
where
    T: Scheduled,
    I: IntoIterator<Item = T>,
{
    items
        .into_iter()
        .filter(|item| window.contains(item.scheduled_at()))
        .filter(|item| owners.iter().all(|f| f.matches(item)))
        .collect()
}
