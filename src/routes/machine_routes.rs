// src/routes/machine_routes.rs

use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Role},
};

const MACHINE_COLUMNS: &str = "machine_id, serial_number, model, room_id, is_available, notes, created_at";

/// A dialysis machine. Plain record; the optional room is where it is installed.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Machine {
    pub machine_id: Uuid,
    pub serial_number: String,
    pub model: String,
    pub room_id: Option<Uuid>,
    pub is_available: bool,
    pub notes: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMachineRequest {
    pub serial_number: String,
    pub model: String,
    pub room_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMachineRequest {
    pub room_id: Option<Uuid>,
    pub is_available: Option<bool>,
    pub notes: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/machines", get(list_machines).post(create_machine))
        .route("/machines/{machine_id}", patch(update_machine))
}

fn ensure_equipment_staff(auth: &AuthContext) -> Result<(), ApiError> {
    auth.require(&[Role::Admin, Role::Nurse], "manage machines")
}

pub async fn list_machines(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<Machine>>>, ApiError> {
    let sql = format!("SELECT {MACHINE_COLUMNS} FROM machine ORDER BY serial_number ASC");
    let rows = sqlx::query_as::<_, Machine>(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk::new(rows)))
}

pub async fn create_machine(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateMachineRequest>,
) -> Result<Json<ApiOk<Machine>>, ApiError> {
    ensure_equipment_staff(&auth)?;

    let serial = req.serial_number.trim();
    if serial.is_empty() || req.model.trim().is_empty() {
        return Err(ApiError::validation("serial_number and model are required"));
    }

    let sql = format!(
        r#"
        INSERT INTO machine (serial_number, model, room_id, notes)
        VALUES ($1, $2, $3, $4)
        RETURNING {MACHINE_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, Machine>(&sql)
        .bind(serial)
        .bind(req.model.trim())
        .bind(req.room_id)
        .bind(req.notes.as_deref())
        .fetch_one(&state.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::Conflict("SERIAL_TAKEN", "serial_number already exists".into())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => ApiError::not_found("room"),
            _ => ApiError::db(e),
        })?;

    Ok(Json(ApiOk::new(row)))
}

pub async fn update_machine(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(machine_id): Path<Uuid>,
    Json(req): Json<UpdateMachineRequest>,
) -> Result<Json<ApiOk<Machine>>, ApiError> {
    ensure_equipment_staff(&auth)?;

    let sql = format!(
        r#"
        UPDATE machine
        SET room_id      = COALESCE($2, room_id),
            is_available = COALESCE($3, is_available),
            notes        = COALESCE($4, notes)
        WHERE machine_id = $1
        RETURNING {MACHINE_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, Machine>(&sql)
        .bind(machine_id)
        .bind(req.room_id)
        .bind(req.is_available)
        .bind(req.notes.as_deref())
        .fetch_optional(&state.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => ApiError::not_found("room"),
            _ => ApiError::db(e),
        })?
        .ok_or_else(|| ApiError::not_found("machine"))?;

    if req.is_available == Some(false) {
        tracing::warn!(%machine_id, "machine taken out of service");
    }
    Ok(Json(ApiOk::new(row)))
}
