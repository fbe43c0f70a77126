use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AppointmentTotals, ScheduleStore, Slot, StoreResult};
use crate::models::{
    Appointment, AppointmentStatus, DialysisSession, DialysisSessionPatch, NewAppointment,
    NewDialysisSession, Room,
};
use crate::scheduling::CalendarWindow;

const APPOINTMENT_COLUMNS: &str = r#"
    appointment_id,
    patient_id,
    doctor_id,
    room_id,
    created_by_reception_id,
    created_by_doctor_id,
    appointment_date,
    estimated_duration_in_minutes,
    status,
    notes,
    created_at,
    updated_at
"#;

const DIALYSIS_COLUMNS: &str = r#"
    session_id,
    dialysis_patient_id,
    session_date,
    duration_minutes,
    completed,
    complications,
    notes,
    created_at
"#;

pub struct PgScheduleStore {
    db: PgPool,
}

impl PgScheduleStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ScheduleStore for PgScheduleStore {
    async fn find_room(&self, room_id: Uuid) -> StoreResult<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            r#"
            SELECT room_id, room_number, capacity, room_type, is_available, created_at
            FROM room
            WHERE room_id = $1
            "#,
        )
        .bind(room_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(room)
    }

    async fn room_appointments_in(
        &self,
        room_id: Uuid,
        window: &CalendarWindow,
    ) -> StoreResult<Vec<Appointment>> {
        let (from, to) = window.bounds();
        let sql = format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointment
            WHERE room_id = $1
              AND ($2::timestamptz IS NULL OR appointment_date >= $2)
              AND ($3::timestamptz IS NULL OR appointment_date <= $3)
            ORDER BY appointment_date ASC
            "#
        );

        let rows = sqlx::query_as::<_, Appointment>(&sql)
            .bind(room_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.db)
            .await?;

        Ok(rows)
    }

    async fn appointments_in(
        &self,
        window: &CalendarWindow,
        doctor_id: Option<Uuid>,
    ) -> StoreResult<Vec<Appointment>> {
        let (from, to) = window.bounds();
        let sql = format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointment
            WHERE ($1::timestamptz IS NULL OR appointment_date >= $1)
              AND ($2::timestamptz IS NULL OR appointment_date <= $2)
              AND ($3::uuid IS NULL OR doctor_id = $3)
            ORDER BY appointment_date ASC
            "#
        );

        let rows = sqlx::query_as::<_, Appointment>(&sql)
            .bind(from)
            .bind(to)
            .bind(doctor_id)
            .fetch_all(&self.db)
            .await?;

        Ok(rows)
    }

    async fn appointment_totals(&self, now: DateTime<Utc>) -> StoreResult<AppointmentTotals> {
        let totals = sqlx::query_as::<_, AppointmentTotals>(
            r#"
            SELECT
              count(*) FILTER (WHERE status = $1 AND appointment_date >= $4) AS upcoming_scheduled,
              count(*) FILTER (WHERE status = $2) AS completed,
              count(*) FILTER (WHERE status = $3) AS canceled
            FROM appointment
            "#,
        )
        .bind(AppointmentStatus::Scheduled)
        .bind(AppointmentStatus::Completed)
        .bind(AppointmentStatus::Canceled)
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        Ok(totals)
    }

    async fn find_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Appointment>> {
        let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE appointment_id = $1");

        let row = sqlx::query_as::<_, Appointment>(&sql)
            .bind(appointment_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(row)
    }

    async fn insert_appointment(&self, new: &NewAppointment) -> StoreResult<Appointment> {
        let (reception_id, doctor_creator_id) = new.created_by.columns();
        let sql = format!(
            r#"
            INSERT INTO appointment (
              patient_id,
              doctor_id,
              room_id,
              created_by_reception_id,
              created_by_doctor_id,
              appointment_date,
              estimated_duration_in_minutes,
              status,
              notes
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, Appointment>(&sql)
            .bind(new.patient_id)
            .bind(new.doctor_id)
            .bind(new.room_id)
            .bind(reception_id)
            .bind(doctor_creator_id)
            .bind(new.appointment_date)
            .bind(new.estimated_duration_in_minutes)
            .bind(AppointmentStatus::Scheduled)
            .bind(new.notes.as_deref())
            .fetch_one(&self.db)
            .await?;

        Ok(row)
    }

    async fn update_appointment_slot(
        &self,
        appointment_id: Uuid,
        slot: Slot,
    ) -> StoreResult<Option<Appointment>> {
        let sql = format!(
            r#"
            UPDATE appointment
            SET room_id = $2,
                appointment_date = $3,
                estimated_duration_in_minutes = $4,
                updated_at = now()
            WHERE appointment_id = $1
              AND status = $5
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, Appointment>(&sql)
            .bind(appointment_id)
            .bind(slot.room_id)
            .bind(slot.appointment_date)
            .bind(slot.estimated_duration_in_minutes)
            .bind(AppointmentStatus::Scheduled)
            .fetch_optional(&self.db)
            .await?;

        Ok(row)
    }

    async fn set_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> StoreResult<Option<Appointment>> {
        let sql = format!(
            r#"
            UPDATE appointment
            SET status = $2,
                updated_at = now()
            WHERE appointment_id = $1
              AND status = $3
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, Appointment>(&sql)
            .bind(appointment_id)
            .bind(status)
            .bind(AppointmentStatus::Scheduled)
            .fetch_optional(&self.db)
            .await?;

        Ok(row)
    }

    async fn dialysis_sessions_in(&self, window: &CalendarWindow) -> StoreResult<Vec<DialysisSession>> {
        let (from, to) = window.bounds();
        let sql = format!(
            r#"
            SELECT {DIALYSIS_COLUMNS}
            FROM dialysis_session
            WHERE ($1::timestamptz IS NULL OR session_date >= $1)
              AND ($2::timestamptz IS NULL OR session_date <= $2)
            "#
        );

        let rows = sqlx::query_as::<_, DialysisSession>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.db)
            .await?;

        Ok(rows)
    }

    async fn insert_dialysis_session(&self, new: &NewDialysisSession) -> StoreResult<DialysisSession> {
        let sql = format!(
            r#"
            INSERT INTO dialysis_session (
              dialysis_patient_id,
              session_date,
              duration_minutes,
              completed,
              complications,
              notes
            )
            VALUES ($1,$2,$3,$4,$5,$6)
            RETURNING {DIALYSIS_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, DialysisSession>(&sql)
            .bind(new.dialysis_patient_id)
            .bind(new.session_date)
            .bind(new.duration_minutes)
            .bind(new.completed)
            .bind(new.complications.as_deref())
            .bind(new.notes.as_deref())
            .fetch_one(&self.db)
            .await?;

        Ok(row)
    }

    async fn update_dialysis_session(
        &self,
        session_id: Uuid,
        patch: &DialysisSessionPatch,
    ) -> StoreResult<Option<DialysisSession>> {
        let sql = format!(
            r#"
            UPDATE dialysis_session
            SET duration_minutes = COALESCE($2, duration_minutes),
                completed        = COALESCE($3, completed),
                complications    = COALESCE($4, complications),
                notes            = COALESCE($5, notes)
            WHERE session_id = $1
            RETURNING {DIALYSIS_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, DialysisSession>(&sql)
            .bind(session_id)
            .bind(patch.duration_minutes)
            .bind(patch.completed)
            .bind(patch.complications.as_deref())
            .bind(patch.notes.as_deref())
            .fetch_optional(&self.db)
            .await?;

        Ok(row)
    }
}
