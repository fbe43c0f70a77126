//! Storage collaborator for the scheduling flows.
//!
//! Handlers and the booking service receive a `ScheduleStore` through
//! `AppState` instead of reaching for a global client. The Postgres
//! implementation lives in `pg`; tests use the in-memory one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    Appointment, AppointmentStatus, DialysisSession, DialysisSessionPatch, NewAppointment,
    NewDialysisSession, Room,
};
use crate::scheduling::CalendarWindow;

#[cfg(test)]
pub mod memory;
pub mod pg;

pub use pg::PgScheduleStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("db error: {0}")]
    Db(#[from] sqlx::Error),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "store failure");
        ApiError::Internal(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// New slot for an existing appointment.
#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub room_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub estimated_duration_in_minutes: i32,
}

/// Appointment counters that span all of history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct AppointmentTotals {
    /// Scheduled and starting at or after the reference instant.
    pub upcoming_scheduled: i64,
    pub completed: i64,
    pub canceled: i64,
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn find_room(&self, room_id: Uuid) -> StoreResult<Option<Room>>;

    /// Appointments in `room_id` starting inside `window`, any status.
    async fn room_appointments_in(
        &self,
        room_id: Uuid,
        window: &CalendarWindow,
    ) -> StoreResult<Vec<Appointment>>;

    /// Appointments starting inside `window`, ordered by start, optionally
    /// limited to one doctor.
    async fn appointments_in(
        &self,
        window: &CalendarWindow,
        doctor_id: Option<Uuid>,
    ) -> StoreResult<Vec<Appointment>>;

    async fn appointment_totals(&self, now: DateTime<Utc>) -> StoreResult<AppointmentTotals>;

    async fn find_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Appointment>>;

    async fn insert_appointment(&self, new: &NewAppointment) -> StoreResult<Appointment>;

    /// Moves a scheduled appointment. Returns `None` if it no longer exists
    /// or has left the scheduled state.
    async fn update_appointment_slot(
        &self,
        appointment_id: Uuid,
        slot: Slot,
    ) -> StoreResult<Option<Appointment>>;

    /// Sets the status of a scheduled appointment. Returns `None` if it no
    /// longer exists or has left the scheduled state.
    async fn set_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> StoreResult<Option<Appointment>>;

    async fn dialysis_sessions_in(&self, window: &CalendarWindow) -> StoreResult<Vec<DialysisSession>>;

    async fn insert_dialysis_session(&self, new: &NewDialysisSession) -> StoreResult<DialysisSession>;

    async fn update_dialysis_session(
        &self,
        session_id: Uuid,
        patch: &DialysisSessionPatch,
    ) -> StoreResult<Option<DialysisSession>>;
}
