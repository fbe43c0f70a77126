// src/routes/room_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    booking::{room_availability, validate_duration},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Role, Room},
    scheduling::{Availability, Candidate},
};

const ROOM_COLUMNS: &str = "room_id, room_number, capacity, room_type, is_available, created_at";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{room_id}", get(get_room).patch(update_room))
        .route("/rooms/{room_id}/availability", get(get_room_availability))
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub room_number: String,
    pub capacity: i32,
    pub room_type: String,
    pub is_available: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoomRequest {
    pub room_number: Option<String>,
    pub capacity: Option<i32>,
    pub room_type: Option<String>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub start: DateTime<Utc>,
    pub duration_minutes: i32,
    /// Appointment being moved; its own slot does not count as a conflict.
    pub exclude_appointment_id: Option<Uuid>,
}

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    auth.require(&[Role::Admin], "manage rooms")
}

fn validate_room_number(room_number: &str) -> Result<String, ApiError> {
    let n = room_number.trim();
    if n.is_empty() {
        return Err(ApiError::validation("room_number is required"));
    }
    if n.len() > 32 {
        return Err(ApiError::validation("room_number is too long (max 32)"));
    }
    Ok(n.to_string())
}

fn validate_capacity(capacity: i32) -> Result<(), ApiError> {
    if capacity <= 0 {
        return Err(ApiError::validation("capacity must be > 0"));
    }
    Ok(())
}

fn duplicate_room_number(e: sqlx::Error) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::Conflict("ROOM_NUMBER_TAKEN", "room_number already exists".into())
        }
        _ => ApiError::db(e),
    }
}

pub async fn list_rooms(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<Room>>>, ApiError> {
    let sql = format!("SELECT {ROOM_COLUMNS} FROM room ORDER BY room_number ASC");
    let rooms = sqlx::query_as::<_, Room>(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk::new(rooms)))
}

pub async fn get_room(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(room_id): Path<Uuid>,
) -> Result<Json<ApiOk<Room>>, ApiError> {
    let room = state
        .store
        .find_room(room_id)
        .await?
        .ok_or_else(|| ApiError::not_found("room"))?;

    Ok(Json(ApiOk::new(room)))
}

pub async fn create_room(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Json<ApiOk<Room>>, ApiError> {
    ensure_admin(&auth)?;
    let room_number = validate_room_number(&req.room_number)?;
    validate_capacity(req.capacity)?;

    let sql = format!(
        r#"
        INSERT INTO room (room_number, capacity, room_type, is_available)
        VALUES ($1, $2, $3, $4)
        RETURNING {ROOM_COLUMNS}
        "#
    );
    let room = sqlx::query_as::<_, Room>(&sql)
        .bind(room_number)
        .bind(req.capacity)
        .bind(req.room_type.trim())
        .bind(req.is_available.unwrap_or(true))
        .fetch_one(&state.db)
        .await
        .map_err(duplicate_room_number)?;

    tracing::info!(room_id = %room.room_id, room_number = %room.room_number, "room created");
    Ok(Json(ApiOk::new(room)))
}

pub async fn update_room(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(room_id): Path<Uuid>,
    Json(req): Json<UpdateRoomRequest>,
) -> Result<Json<ApiOk<Room>>, ApiError> {
    ensure_admin(&auth)?;
    let room_number = req.room_number.as_deref().map(validate_room_number).transpose()?;
    if let Some(c) = req.capacity {
        validate_capacity(c)?;
    }

    let sql = format!(
        r#"
        UPDATE room
        SET room_number  = COALESCE($2, room_number),
            capacity     = COALESCE($3, capacity),
            room_type    = COALESCE($4, room_type),
            is_available = COALESCE($5, is_available)
        WHERE room_id = $1
        RETURNING {ROOM_COLUMNS}
        "#
    );
    let room = sqlx::query_as::<_, Room>(&sql)
        .bind(room_id)
        .bind(room_number)
        .bind(req.capacity)
        .bind(req.room_type.as_deref().map(str::trim))
        .bind(req.is_available)
        .fetch_optional(&state.db)
        .await
        .map_err(duplicate_room_number)?
        .ok_or_else(|| ApiError::not_found("room"))?;

    Ok(Json(ApiOk::new(room)))
}

pub async fn get_room_availability(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(room_id): Path<Uuid>,
    Query(q): Query<AvailabilityQuery>,
) -> Result<Json<ApiOk<Availability>>, ApiError> {
    validate_duration(q.duration_minutes)?;

    let candidate = Candidate::new(q.start, q.duration_minutes);
    let availability =
        room_availability(state.store.as_ref(), room_id, candidate, q.exclude_appointment_id).await?;

    Ok(Json(ApiOk::new(availability)))
}
