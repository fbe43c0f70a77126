use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{AppointmentTotals, ScheduleStore, Slot, StoreResult};
use crate::models::{
    Appointment, AppointmentStatus, DialysisSession, DialysisSessionPatch, NewAppointment,
    NewDialysisSession, Room,
};
use crate::scheduling::CalendarWindow;

/// Vec-backed store for tests.
#[derive(Default)]
pub struct MemoryStore {
    rooms: Mutex<Vec<Room>>,
    appointments: Mutex<Vec<Appointment>>,
    sessions: Mutex<Vec<DialysisSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_room(self, room: Room) -> Self {
        self.rooms.lock().unwrap().push(room);
        self
    }

    pub fn with_appointment(self, appointment: Appointment) -> Self {
        self.appointments.lock().unwrap().push(appointment);
        self
    }

    pub fn with_session(self, session: DialysisSession) -> Self {
        self.sessions.lock().unwrap().push(session);
        self
    }

    pub fn appointment_count(&self) -> usize {
        self.appointments.lock().unwrap().len()
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn find_room(&self, room_id: Uuid) -> StoreResult<Option<Room>> {
        Ok(self
            .rooms
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.room_id == room_id)
            .cloned())
    }

    async fn room_appointments_in(
        &self,
        room_id: Uuid,
        window: &CalendarWindow,
    ) -> StoreResult<Vec<Appointment>> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.room_id == room_id && window.contains(a.appointment_date))
            .cloned()
            .collect())
    }

    async fn appointments_in(
        &self,
        window: &CalendarWindow,
        doctor_id: Option<Uuid>,
    ) -> StoreResult<Vec<Appointment>> {
        let mut rows: Vec<Appointment> = self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| window.contains(a.appointment_date))
            .filter(|a| doctor_id.is_none_or(|d| a.doctor_id == d))
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.appointment_date);
        Ok(rows)
    }

    async fn appointment_totals(&self, now: DateTime<Utc>) -> StoreResult<AppointmentTotals> {
        let mut totals = AppointmentTotals::default();
        for a in self.appointments.lock().unwrap().iter() {
            match a.status {
                AppointmentStatus::Scheduled if a.appointment_date >= now => totals.upcoming_scheduled += 1,
                AppointmentStatus::Completed => totals.completed += 1,
                AppointmentStatus::Canceled => totals.canceled += 1,
                _ => {}
            }
        }
        Ok(totals)
    }

    async fn find_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Appointment>> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.appointment_id == appointment_id)
            .cloned())
    }

    async fn insert_appointment(&self, new: &NewAppointment) -> StoreResult<Appointment> {
        let (reception_id, doctor_creator_id) = new.created_by.columns();
        let now = Utc::now();
        let row = Appointment {
            appointment_id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            room_id: new.room_id,
            created_by_reception_id: reception_id,
            created_by_doctor_id: doctor_creator_id,
            appointment_date: new.appointment_date,
            estimated_duration_in_minutes: new.estimated_duration_in_minutes,
            status: AppointmentStatus::Scheduled,
            notes: new.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        self.appointments.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn update_appointment_slot(
        &self,
        appointment_id: Uuid,
        slot: Slot,
    ) -> StoreResult<Option<Appointment>> {
        let mut rows = self.appointments.lock().unwrap();
        let Some(a) = rows
            .iter_mut()
            .find(|a| a.appointment_id == appointment_id && a.status == AppointmentStatus::Scheduled)
        else {
            return Ok(None);
        };
        a.room_id = slot.room_id;
        a.appointment_date = slot.appointment_date;
        a.estimated_duration_in_minutes = slot.estimated_duration_in_minutes;
        a.updated_at = Utc::now();
        Ok(Some(a.clone()))
    }

    async fn set_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> StoreResult<Option<Appointment>> {
        let mut rows = self.appointments.lock().unwrap();
        let Some(a) = rows
            .iter_mut()
            .find(|a| a.appointment_id == appointment_id && a.status == AppointmentStatus::Scheduled)
        else {
            return Ok(None);
        };
        a.status = status;
        a.updated_at = Utc::now();
        Ok(Some(a.clone()))
    }

    async fn dialysis_sessions_in(&self, window: &CalendarWindow) -> StoreResult<Vec<DialysisSession>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| window.contains(s.session_date))
            .cloned()
            .collect())
    }

    async fn insert_dialysis_session(&self, new: &NewDialysisSession) -> StoreResult<DialysisSession> {
        let row = DialysisSession {
            session_id: Uuid::new_v4(),
            dialysis_patient_id: new.dialysis_patient_id,
            session_date: new.session_date,
            duration_minutes: new.duration_minutes,
            completed: new.completed,
            complications: new.complications.clone(),
            notes: new.notes.clone(),
            created_at: Utc::now(),
        };
        self.sessions.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn update_dialysis_session(
        &self,
        session_id: Uuid,
        patch: &DialysisSessionPatch,
    ) -> StoreResult<Option<DialysisSession>> {
        let mut rows = self.sessions.lock().unwrap();
        let Some(s) = rows.iter_mut().find(|s| s.session_id == session_id) else {
            return Ok(None);
        };
        if let Some(d) = patch.duration_minutes {
            s.duration_minutes = Some(d);
        }
        if let Some(c) = patch.completed {
            s.completed = c;
        }
        if let Some(c) = &patch.complications {
            s.complications = Some(c.clone());
        }
        if let Some(n) = &patch.notes {
            s.notes = Some(n.clone());
        }
        Ok(Some(s.clone()))
    }
}
