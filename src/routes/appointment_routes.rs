// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    booking::{book_appointment, reschedule_appointment, transition_appointment, Reschedule},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Appointment, AppointmentStatus, CreatedBy, NewAppointment, Role},
    routes::WindowQuery,
    scheduling::{list_in_window, Bookable, OwnerFilter, WindowBounds},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route("/appointments/{appointment_id}", get(get_appointment).patch(patch_appointment))
        .route("/appointments/{appointment_id}/complete", post(complete_appointment))
        .route("/appointments/{appointment_id}/cancel", post(cancel_appointment))
        .route("/appointments/{appointment_id}/no_show", post(no_show_appointment))
}

const SCHEDULING_ROLES: [Role; 3] = [Role::Admin, Role::Receptionist, Role::Doctor];

fn ensure_own_if_doctor(auth: &AuthContext, appointment: &Appointment) -> Result<(), ApiError> {
    if auth.is(Role::Doctor) && appointment.doctor_id != auth.user_id {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Doctor can only act on their own appointments".into(),
        ));
    }
    Ok(())
}

/* ============================================================
   GET /appointments
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(flatten)]
    pub window: WindowQuery,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentList {
    pub window: WindowBounds,
    pub appointments: Vec<Appointment>,
}

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<AppointmentList>>, ApiError> {
    let (view, window) = q.window.resolve(Utc::now())?;
    let doctor_id = auth.doctor_scope(q.doctor_id)?;

    let candidates = state.store.appointments_in(&window, doctor_id).await?;
    let owners = OwnerFilter::from_params(q.patient_id, None, q.room_id);
    let appointments = list_in_window(candidates, &owners, &window);

    Ok(Json(ApiOk::new(AppointmentList {
        window: WindowBounds::new(view, &window),
        appointments,
    })))
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct PersonBrief {
    pub id: Uuid,
    pub display: String,
}

#[derive(Debug, Serialize)]
pub struct RoomBrief {
    pub id: Uuid,
    pub room_number: String,
}

/// Appointment with the names the dashboard table shows.
#[derive(Debug, Serialize)]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub end_at: DateTime<Utc>,
    pub booked_by: Option<Role>,
    pub patient: PersonBrief,
    pub doctor: PersonBrief,
    pub room: RoomBrief,
}

async fn load_detail(state: &AppState, appointment: Appointment) -> Result<AppointmentDetail, ApiError> {
    let row = sqlx::query(
        r#"
        SELECT
          p.first_name AS p_first,
          p.last_name  AS p_last,
          d.display_name AS d_name,
          r.room_number AS r_number
        FROM patient p, app_user d, room r
        WHERE p.patient_id = $1
          AND d.user_id = $2
          AND r.room_id = $3
        "#,
    )
    .bind(appointment.patient_id)
    .bind(appointment.doctor_id)
    .bind(appointment.room_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::Internal("appointment references missing rows".into()))?;

    let p_first: String = row.try_get("p_first").map_err(internal_row)?;
    let p_last: String = row.try_get("p_last").map_err(internal_row)?;
    let d_name: String = row.try_get("d_name").map_err(internal_row)?;
    let r_number: String = row.try_get("r_number").map_err(internal_row)?;

    let end_at = appointment.interval().end;
    let booked_by = appointment.created_by().map(|c| match c {
        CreatedBy::Reception(_) => Role::Receptionist,
        CreatedBy::Doctor(_) => Role::Doctor,
    });

    Ok(AppointmentDetail {
        patient: PersonBrief {
            id: appointment.patient_id,
            display: format!("{p_first} {p_last}"),
        },
        doctor: PersonBrief {
            id: appointment.doctor_id,
            display: d_name,
        },
        room: RoomBrief {
            id: appointment.room_id,
            room_number: r_number,
        },
        end_at,
        booked_by,
        appointment,
    })
}

fn internal_row(e: sqlx::Error) -> ApiError {
    ApiError::Internal(format!("row decode error: {e}"))
}

async fn find_visible(
    state: &AppState,
    auth: &AuthContext,
    appointment_id: Uuid,
) -> Result<Appointment, ApiError> {
    let appointment = state
        .store
        .find_appointment(appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;
    ensure_own_if_doctor(auth, &appointment)?;
    Ok(appointment)
}

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDetail>>, ApiError> {
    let appointment = find_visible(&state, &auth, appointment_id).await?;
    Ok(Json(ApiOk::new(load_detail(&state, appointment).await?)))
}

/* ============================================================
   POST /appointments
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    /// Defaults to the caller when a doctor books.
    pub doctor_id: Option<Uuid>,
    pub room_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub estimated_duration_in_minutes: i32,
    pub notes: Option<String>,
}

async fn ensure_booking_parties(
    state: &AppState,
    patient_id: Uuid,
    doctor_id: Uuid,
) -> Result<(), ApiError> {
    let row = sqlx::query(
        r#"
        SELECT
          EXISTS (SELECT 1 FROM patient WHERE patient_id = $1) AS patient_ok,
          EXISTS (
            SELECT 1 FROM app_user
            WHERE user_id = $2 AND role = $3 AND is_active = true
          ) AS doctor_ok
        "#,
    )
    .bind(patient_id)
    .bind(doctor_id)
    .bind(Role::Doctor)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let patient_ok: bool = row.try_get("patient_ok").map_err(internal_row)?;
    let doctor_ok: bool = row.try_get("doctor_ok").map_err(internal_row)?;
    if !patient_ok {
        return Err(ApiError::not_found("patient"));
    }
    if !doctor_ok {
        return Err(ApiError::not_found("doctor"));
    }
    Ok(())
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDetail>>, ApiError> {
    let created_by = CreatedBy::for_role(auth.role, auth.user_id).ok_or_else(|| {
        ApiError::Forbidden(
            "FORBIDDEN",
            "Only receptionist/doctor can book appointments".into(),
        )
    })?;

    let doctor_id = match (created_by, req.doctor_id) {
        (CreatedBy::Doctor(me), None) => me,
        (CreatedBy::Doctor(me), Some(id)) if id == me => me,
        (CreatedBy::Doctor(_), Some(_)) => {
            return Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Doctor can only book into their own schedule".into(),
            ));
        }
        (CreatedBy::Reception(_), Some(id)) => id,
        (CreatedBy::Reception(_), None) => {
            return Err(ApiError::validation("doctor_id is required"));
        }
    };

    ensure_booking_parties(&state, req.patient_id, doctor_id).await?;

    let new = NewAppointment {
        patient_id: req.patient_id,
        doctor_id,
        room_id: req.room_id,
        created_by,
        appointment_date: req.appointment_date,
        estimated_duration_in_minutes: req.estimated_duration_in_minutes,
        notes: req.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
    };

    let appointment = book_appointment(state.store.as_ref(), new).await?;
    Ok(Json(ApiOk::new(load_detail(&state, appointment).await?)))
}

/* ============================================================
   PATCH /appointments/{id}  (reschedule)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct PatchAppointmentRequest {
    pub room_id: Option<Uuid>,
    pub appointment_date: Option<DateTime<Utc>>,
    pub estimated_duration_in_minutes: Option<i32>,
}

pub async fn patch_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<PatchAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDetail>>, ApiError> {
    auth.require(&SCHEDULING_ROLES, "reschedule appointments")?;
    find_visible(&state, &auth, appointment_id).await?;

    let changes = Reschedule {
        room_id: req.room_id,
        appointment_date: req.appointment_date,
        estimated_duration_in_minutes: req.estimated_duration_in_minutes,
    };
    let appointment = reschedule_appointment(state.store.as_ref(), appointment_id, changes).await?;

    Ok(Json(ApiOk::new(load_detail(&state, appointment).await?)))
}

/* ============================================================
   Status transitions
   ============================================================ */

async fn transition(
    state: AppState,
    auth: AuthContext,
    appointment_id: Uuid,
    next: AppointmentStatus,
) -> Result<Json<ApiOk<AppointmentDetail>>, ApiError> {
    auth.require(&SCHEDULING_ROLES, "change appointment status")?;
    find_visible(&state, &auth, appointment_id).await?;

    let appointment = transition_appointment(state.store.as_ref(), appointment_id, next).await?;
    Ok(Json(ApiOk::new(load_detail(&state, appointment).await?)))
}

pub async fn complete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDetail>>, ApiError> {
    transition(state, auth, appointment_id, AppointmentStatus::Completed).await
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDetail>>, ApiError> {
    transition(state, auth, appointment_id, AppointmentStatus::Canceled).await
}

pub async fn no_show_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDetail>>, ApiError> {
    transition(state, auth, appointment_id, AppointmentStatus::NoShow).await
}
