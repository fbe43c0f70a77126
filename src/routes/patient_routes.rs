// src/routes/patient_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Appointment},
    routes::WindowQuery,
    scheduling::{list_in_window, CalendarWindow, OwnerField, OwnerFilter},
    store::ScheduleStore,
};

const PATIENT_COLUMNS: &str = r#"
    patient_id, first_name, last_name, birthday, gender, phone, email, address, created_at
"#;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PatientRow {
    pub patient_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<chrono::NaiveDate>,
    pub gender: i16,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<chrono::NaiveDate>,
    pub gender: i16, // 0 unspecified, 1 female, 2 male
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// `Some(None)` clears a nullable column, absent leaves it alone.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub birthday: Option<Option<chrono::NaiveDate>>,
    pub gender: Option<i16>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub address: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", post(create_patient).get(search_patients))
        .route("/patients/{patient_id}", get(get_patient).patch(update_patient))
        .route("/patients/{patient_id}/appointments", get(list_patient_appointments))
}

fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // Only reached when the field is present; `null` becomes Some(None).
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_gender(gender: i16) -> Result<(), ApiError> {
    if !(0..=2).contains(&gender) {
        return Err(ApiError::validation("gender must be 0, 1 or 2"));
    }
    Ok(())
}

fn required_name(field: &str, value: &str) -> Result<String, ApiError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(v.to_string())
}

pub async fn create_patient(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(req): Json<CreatePatientRequest>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    let first_name = required_name("first_name", &req.first_name)?;
    let last_name = required_name("last_name", &req.last_name)?;
    validate_gender(req.gender)?;

    let sql = format!(
        r#"
        INSERT INTO patient (first_name, last_name, birthday, gender, phone, email, address)
        VALUES ($1,$2,$3,$4,$5,$6,$7)
        RETURNING {PATIENT_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(first_name)
        .bind(last_name)
        .bind(req.birthday)
        .bind(req.gender)
        .bind(req.phone.as_deref().map(str::trim))
        .bind(req.email.as_deref().map(str::trim))
        .bind(req.address.as_deref())
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk::new(row)))
}

pub async fn get_patient(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patient WHERE patient_id = $1");
    let row = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(patient_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("patient"))?;

    Ok(Json(ApiOk::new(row)))
}

pub async fn search_patients(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<SearchQuery>,
) -> Result<Json<ApiOk<Vec<PatientRow>>>, ApiError> {
    let limit = q.limit.unwrap_or(50).clamp(1, 200);
    let term = q
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let sql = format!(
        r#"
        SELECT {PATIENT_COLUMNS}
        FROM patient
        WHERE $1::text IS NULL
           OR first_name ILIKE $1
           OR last_name ILIKE $1
           OR phone ILIKE $1
        ORDER BY last_name ASC, first_name ASC
        LIMIT $2
        "#
    );
    let rows = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(term)
        .bind(limit)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk::new(rows)))
}

pub async fn update_patient(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(patient_id): Path<Uuid>,
    Json(req): Json<UpdatePatientRequest>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    let first_name = req
        .first_name
        .as_deref()
        .map(|v| required_name("first_name", v))
        .transpose()?;
    let last_name = req
        .last_name
        .as_deref()
        .map(|v| required_name("last_name", v))
        .transpose()?;
    if let Some(g) = req.gender {
        validate_gender(g)?;
    }

    // Nullable columns take a (present, value) pair so an explicit null clears them
    let sql = format!(
        r#"
        UPDATE patient
        SET first_name = COALESCE($2, first_name),
            last_name  = COALESCE($3, last_name),
            gender     = COALESCE($4, gender),
            birthday   = CASE WHEN $5 THEN $6 ELSE birthday END,
            phone      = CASE WHEN $7 THEN $8 ELSE phone END,
            email      = CASE WHEN $9 THEN $10 ELSE email END,
            address    = CASE WHEN $11 THEN $12 ELSE address END
        WHERE patient_id = $1
        RETURNING {PATIENT_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(patient_id)
        .bind(first_name)
        .bind(last_name)
        .bind(req.gender)
        .bind(req.birthday.is_some())
        .bind(req.birthday.flatten())
        .bind(req.phone.is_some())
        .bind(req.phone.clone().flatten())
        .bind(req.email.is_some())
        .bind(req.email.clone().flatten())
        .bind(req.address.is_some())
        .bind(req.address.clone().flatten())
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("patient"))?;

    Ok(Json(ApiOk::new(row)))
}

/// Appointment history of one patient, most recent first. Doctors only see
/// the visits booked with them.
async fn patient_history(
    store: &dyn ScheduleStore,
    auth: &AuthContext,
    patient_id: Uuid,
    window: &CalendarWindow,
) -> Result<Vec<Appointment>, ApiError> {
    let doctor_id = auth.doctor_scope(None)?;
    let candidates = store.appointments_in(window, doctor_id).await?;

    let owner = OwnerFilter::new(OwnerField::Patient, patient_id);
    let mut rows = list_in_window(candidates, &[owner], window);
    rows.sort_by(|a, b| b.appointment_date.cmp(&a.appointment_date));
    Ok(rows)
}

pub async fn list_patient_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
    Query(q): Query<WindowQuery>,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let (_, window) = q.resolve(chrono::Utc::now())?;
    let rows = patient_history(state.store.as_ref(), &auth, patient_id, &window).await?;
    Ok(Json(ApiOk::new(rows)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::appointment;
    use crate::models::{AppointmentStatus, Role};
    use crate::store::memory::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn ctx(role: Role) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            role,
            session_token_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_doctor_sees_only_own_visits_in_patient_history() {
        let doctor = ctx(Role::Doctor);
        let start = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).single().unwrap();

        let mut mine = appointment(Uuid::new_v4(), start, 30, AppointmentStatus::Scheduled);
        mine.doctor_id = doctor.user_id;
        let mut theirs = appointment(Uuid::new_v4(), start, 30, AppointmentStatus::Scheduled);
        theirs.patient_id = mine.patient_id;
        let patient_id = mine.patient_id;

        let store = MemoryStore::new()
            .with_appointment(mine.clone())
            .with_appointment(theirs.clone());

        let seen = patient_history(&store, &doctor, patient_id, &CalendarWindow::Unbounded)
            .await
            .unwrap();
        let ids: Vec<Uuid> = seen.iter().map(|a| a.appointment_id).collect();
        assert_eq!(ids, vec![mine.appointment_id]);

        let reception = ctx(Role::Receptionist);
        let seen = patient_history(&store, &reception, patient_id, &CalendarWindow::Unbounded)
            .await
            .unwrap();
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let req: UpdatePatientRequest =
            serde_json::from_value(serde_json::json!({ "phone": null, "email": "a@b.c" })).unwrap();
        assert_eq!(req.phone, Some(None));
        assert_eq!(req.email, Some(Some("a@b.c".to_string())));
        assert_eq!(req.address, None);
        assert_eq!(req.birthday, None);
    }

    #[test]
    fn test_name_and_gender_validation() {
        assert!(required_name("first_name", "   ").is_err());
        assert_eq!(required_name("first_name", " Ada ").unwrap(), "Ada");
        assert!(validate_gender(3).is_err());
        assert!(validate_gender(1).is_ok());
    }
}
