use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::store::ScheduleStore;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub store: Arc<dyn ScheduleStore>,
    pub session_ttl_hours: i64,
}

/* -------------------------
   API envelopes
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

impl<T> ApiOk<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

/* -------------------------
   Auth DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub device_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponseData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MeResponseData {
    pub user: UserProfile,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   Enumerations (smallint in DB)
--------------------------*/

/// 1 admin, 2 doctor, 3 receptionist, 4 nurse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
pub enum Role {
    Admin = 1,
    Doctor = 2,
    Receptionist = 3,
    Nurse = 4,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Receptionist => "receptionist",
            Role::Nurse => "nurse",
        }
    }
}

/// 0 scheduled, 1 completed, 2 canceled, 3 no-show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
pub enum AppointmentStatus {
    Scheduled = 0,
    Completed = 1,
    Canceled = 2,
    NoShow = 3,
}

impl AppointmentStatus {
    /// Only scheduled appointments hold a room.
    pub fn blocks_room(self) -> bool {
        matches!(self, AppointmentStatus::Scheduled)
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, AppointmentStatus::Scheduled)
    }

    /// Scheduled moves to any terminal state; terminal states are final.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        self == AppointmentStatus::Scheduled && next.is_terminal()
    }
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub room_id: Uuid,
    pub room_number: String,
    pub capacity: i32,
    pub room_type: String,
    /// Manual override, independent of bookings.
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub created_by_reception_id: Option<Uuid>,
    pub created_by_doctor_id: Option<Uuid>,
    pub appointment_date: DateTime<Utc>,
    pub estimated_duration_in_minutes: i32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Who booked an appointment. Exactly one of the two creator columns is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedBy {
    Reception(Uuid),
    Doctor(Uuid),
}

impl CreatedBy {
    pub fn for_role(role: Role, user_id: Uuid) -> Option<Self> {
        match role {
            Role::Receptionist => Some(CreatedBy::Reception(user_id)),
            Role::Doctor => Some(CreatedBy::Doctor(user_id)),
            Role::Admin | Role::Nurse => None,
        }
    }

    /// `(created_by_reception_id, created_by_doctor_id)`
    pub fn columns(self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            CreatedBy::Reception(id) => (Some(id), None),
            CreatedBy::Doctor(id) => (None, Some(id)),
        }
    }
}

impl Appointment {
    pub fn created_by(&self) -> Option<CreatedBy> {
        match (self.created_by_reception_id, self.created_by_doctor_id) {
            (Some(id), None) => Some(CreatedBy::Reception(id)),
            (None, Some(id)) => Some(CreatedBy::Doctor(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub created_by: CreatedBy,
    pub appointment_date: DateTime<Utc>,
    pub estimated_duration_in_minutes: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DialysisSession {
    pub session_id: Uuid,
    pub dialysis_patient_id: Uuid,
    pub session_date: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub completed: bool,
    pub complications: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDialysisSession {
    pub dialysis_patient_id: Uuid,
    pub session_date: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub completed: bool,
    pub complications: Option<String>,
    pub notes: Option<String>,
}

/// Partial update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DialysisSessionPatch {
    pub duration_minutes: Option<i32>,
    pub completed: Option<bool>,
    pub complications: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    pub fn room() -> Room {
        Room {
            room_id: Uuid::new_v4(),
            room_number: "101".into(),
            capacity: 2,
            room_type: "consultation".into(),
            is_available: true,
            created_at: Utc::now(),
        }
    }

    pub fn appointment(
        room_id: Uuid,
        start: DateTime<Utc>,
        duration_minutes: i32,
        status: AppointmentStatus,
    ) -> Appointment {
        Appointment {
            appointment_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            room_id,
            created_by_reception_id: Some(Uuid::new_v4()),
            created_by_doctor_id: None,
            appointment_date: start,
            estimated_duration_in_minutes: duration_minutes,
            status,
            notes: None,
            created_at: start,
            updated_at: start,
        }
    }

    pub fn dialysis_session(patient_id: Uuid, date: DateTime<Utc>) -> DialysisSession {
        DialysisSession {
            session_id: Uuid::new_v4(),
            dialysis_patient_id: patient_id,
            session_date: date,
            duration_minutes: Some(240),
            completed: false,
            complications: None,
            notes: None,
            created_at: date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lifecycle() {
        use AppointmentStatus::*;
        assert!(Scheduled.can_transition_to(Completed));
        assert!(Scheduled.can_transition_to(Canceled));
        assert!(Scheduled.can_transition_to(NoShow));
        assert!(!Scheduled.can_transition_to(Scheduled));
        for terminal in [Completed, Canceled, NoShow] {
            for next in [Scheduled, Completed, Canceled, NoShow] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_created_by_is_exclusive() {
        let id = Uuid::new_v4();
        assert_eq!(CreatedBy::Reception(id).columns(), (Some(id), None));
        assert_eq!(CreatedBy::Doctor(id).columns(), (None, Some(id)));
        assert_eq!(CreatedBy::for_role(Role::Admin, id), None);

        let mut a = test_support::appointment(
            Uuid::new_v4(),
            Utc::now(),
            30,
            AppointmentStatus::Scheduled,
        );
        a.created_by_doctor_id = Some(id);
        assert_eq!(a.created_by(), None);
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_value(AppointmentStatus::NoShow).unwrap();
        assert_eq!(json, "NO_SHOW");
    }
}
