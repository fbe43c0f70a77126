//! Appointment booking flows: room lookup, same-day fetch, availability
//! decision, then write.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Appointment, AppointmentStatus, NewAppointment};
use crate::scheduling::{check_availability, resolve_window, Availability, Candidate, Granularity};
use crate::store::{ScheduleStore, Slot};

/// Upper bound for a single appointment.
const MAX_DURATION_MINUTES: i32 = 24 * 60;

pub fn validate_duration(minutes: i32) -> Result<(), ApiError> {
    if minutes <= 0 {
        return Err(ApiError::validation("estimated_duration_in_minutes must be > 0"));
    }
    if minutes > MAX_DURATION_MINUTES {
        return Err(ApiError::validation(format!(
            "estimated_duration_in_minutes must be <= {MAX_DURATION_MINUTES}"
        )));
    }
    Ok(())
}

/// Availability of `room_id` for `candidate`, ignoring `exclude` (the
/// appointment being moved, if any).
pub async fn room_availability(
    store: &dyn ScheduleStore,
    room_id: Uuid,
    candidate: Candidate,
    exclude: Option<Uuid>,
) -> Result<Availability, ApiError> {
    let room = store
        .find_room(room_id)
        .await?
        .ok_or_else(|| ApiError::not_found("room"))?;

    let day = resolve_window(candidate.start, Granularity::Day);
    let mut bookings = store.room_appointments_in(room_id, &day).await?;
    if let Some(id) = exclude {
        bookings.retain(|a| a.appointment_id != id);
    }

    let availability = check_availability(&room, &candidate, &bookings);
    debug!(
        %room_id,
        start = %candidate.start,
        duration = candidate.duration_minutes,
        available = availability.available,
        "room availability checked"
    );
    Ok(availability)
}

fn ensure_available(availability: Availability) -> Result<(), ApiError> {
    match availability {
        Availability { available: true, .. } => Ok(()),
        Availability {
            conflicting_appointment_id: Some(id),
            ..
        } => Err(ApiError::Conflict(
            "SLOT_TAKEN",
            format!("room is already booked by appointment {id}"),
        )),
        Availability {
            conflicting_appointment_id: None,
            ..
        } => Err(ApiError::Conflict(
            "ROOM_UNAVAILABLE",
            "room is marked unavailable".into(),
        )),
    }
}

pub async fn book_appointment(
    store: &dyn ScheduleStore,
    new: NewAppointment,
) -> Result<Appointment, ApiError> {
    validate_duration(new.estimated_duration_in_minutes)?;

    let candidate = Candidate::new(new.appointment_date, new.estimated_duration_in_minutes);
    let availability = room_availability(store, new.room_id, candidate, None).await?;
    if let Err(e) = ensure_available(availability) {
        warn!(room_id = %new.room_id, start = %new.appointment_date, "booking rejected");
        return Err(e);
    }

    // Not atomic with the check above; concurrent bookings can both land.
    let appointment = store.insert_appointment(&new).await?;

    info!(
        appointment_id = %appointment.appointment_id,
        room_id = %appointment.room_id,
        start = %appointment.appointment_date,
        "appointment booked"
    );
    Ok(appointment)
}

/// Requested changes to a scheduled appointment's slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reschedule {
    pub room_id: Option<Uuid>,
    pub appointment_date: Option<chrono::DateTime<chrono::Utc>>,
    pub estimated_duration_in_minutes: Option<i32>,
}

impl Reschedule {
    pub fn is_empty(&self) -> bool {
        self.room_id.is_none()
            && self.appointment_date.is_none()
            && self.estimated_duration_in_minutes.is_none()
    }
}

pub async fn reschedule_appointment(
    store: &dyn ScheduleStore,
    appointment_id: Uuid,
    changes: Reschedule,
) -> Result<Appointment, ApiError> {
    let current = store
        .find_appointment(appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;

    if current.status != AppointmentStatus::Scheduled {
        return Err(ApiError::Conflict(
            "INVALID_TRANSITION",
            "only scheduled appointments can be rescheduled".into(),
        ));
    }
    if changes.is_empty() {
        return Ok(current);
    }

    let slot = Slot {
        room_id: changes.room_id.unwrap_or(current.room_id),
        appointment_date: changes.appointment_date.unwrap_or(current.appointment_date),
        estimated_duration_in_minutes: changes
            .estimated_duration_in_minutes
            .unwrap_or(current.estimated_duration_in_minutes),
    };
    validate_duration(slot.estimated_duration_in_minutes)?;

    let candidate = Candidate::new(slot.appointment_date, slot.estimated_duration_in_minutes);
    let availability = room_availability(store, slot.room_id, candidate, Some(appointment_id)).await?;
    ensure_available(availability)?;

    let updated = store
        .update_appointment_slot(appointment_id, slot)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict(
                "INVALID_TRANSITION",
                "appointment is no longer scheduled".into(),
            )
        })?;

    info!(%appointment_id, start = %updated.appointment_date, "appointment rescheduled");
    Ok(updated)
}

pub async fn transition_appointment(
    store: &dyn ScheduleStore,
    appointment_id: Uuid,
    next: AppointmentStatus,
) -> Result<Appointment, ApiError> {
    let current = store
        .find_appointment(appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;

    if !current.status.can_transition_to(next) {
        return Err(ApiError::Conflict(
            "INVALID_TRANSITION",
            format!("cannot move appointment from {:?} to {:?}", current.status, next),
        ));
    }

    let updated = store
        .set_appointment_status(appointment_id, next)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict(
                "INVALID_TRANSITION",
                "appointment is no longer scheduled".into(),
            )
        })?;

    info!(%appointment_id, status = ?updated.status, "appointment status changed");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{appointment, room};
    use crate::models::CreatedBy;
    use crate::store::memory::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, h, m, 0).single().unwrap()
    }

    fn new_appointment(room_id: Uuid, start: DateTime<Utc>, minutes: i32) -> NewAppointment {
        NewAppointment {
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            room_id,
            created_by: CreatedBy::Reception(Uuid::new_v4()),
            appointment_date: start,
            estimated_duration_in_minutes: minutes,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_book_then_reject_overlap_then_accept_back_to_back() {
        let r = room();
        let store = MemoryStore::new().with_room(r.clone());

        let first = book_appointment(&store, new_appointment(r.room_id, at(9, 0), 30))
            .await
            .unwrap();
        assert_eq!(first.status, AppointmentStatus::Scheduled);
        assert_eq!(first.created_by_doctor_id, None);

        let err = book_appointment(&store, new_appointment(r.room_id, at(9, 15), 30))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SLOT_TAKEN");

        let availability = room_availability(&store, r.room_id, Candidate::new(at(9, 15), 30), None)
            .await
            .unwrap();
        assert_eq!(availability, Availability::conflict(first.appointment_id));

        book_appointment(&store, new_appointment(r.room_id, at(9, 30), 30))
            .await
            .unwrap();
        assert_eq!(store.appointment_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_room_is_not_found() {
        let store = MemoryStore::new();
        let err = book_appointment(&store, new_appointment(Uuid::new_v4(), at(9, 0), 30))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_closed_room_rejects_booking() {
        let mut r = room();
        r.is_available = false;
        let store = MemoryStore::new().with_room(r.clone());

        let err = book_appointment(&store, new_appointment(r.room_id, at(9, 0), 30))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ROOM_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_non_positive_duration_is_rejected() {
        let r = room();
        let store = MemoryStore::new().with_room(r.clone());
        let err = book_appointment(&store, new_appointment(r.room_id, at(9, 0), 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_canceled_slot_can_be_rebooked() {
        let r = room();
        let canceled = appointment(r.room_id, at(9, 0), 30, AppointmentStatus::Canceled);
        let store = MemoryStore::new().with_room(r.clone()).with_appointment(canceled);

        assert!(book_appointment(&store, new_appointment(r.room_id, at(9, 0), 30))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_reschedule_ignores_itself_but_not_others() {
        let r = room();
        let moving = appointment(r.room_id, at(9, 0), 30, AppointmentStatus::Scheduled);
        let other = appointment(r.room_id, at(10, 0), 30, AppointmentStatus::Scheduled);
        let store = MemoryStore::new()
            .with_room(r)
            .with_appointment(moving.clone())
            .with_appointment(other);

        let stretched = reschedule_appointment(
            &store,
            moving.appointment_id,
            Reschedule {
                estimated_duration_in_minutes: Some(60),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(stretched.estimated_duration_in_minutes, 60);

        let err = reschedule_appointment(
            &store,
            moving.appointment_id,
            Reschedule {
                appointment_date: Some(at(9, 45)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "SLOT_TAKEN");
    }

    #[tokio::test]
    async fn test_terminal_states_do_not_revert() {
        let r = room();
        let a = appointment(r.room_id, at(9, 0), 30, AppointmentStatus::Scheduled);
        let store = MemoryStore::new().with_room(r).with_appointment(a.clone());

        let done = transition_appointment(&store, a.appointment_id, AppointmentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, AppointmentStatus::Completed);

        let err = transition_appointment(&store, a.appointment_id, AppointmentStatus::Canceled)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");

        let err = reschedule_appointment(
            &store,
            a.appointment_id,
            Reschedule {
                appointment_date: Some(at(11, 0)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }
}
