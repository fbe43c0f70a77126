// src/routes/stats_routes.rs

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Room},
    scheduling::{resolve_window, Granularity},
    stats::{self, DashboardStats, HISTORY_DAYS},
    store::ScheduleStore,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/stats/dashboard", get(dashboard))
}

/// Loads only the windows the dashboard shows plus the status totals.
async fn dashboard_stats(
    store: &dyn ScheduleStore,
    now: DateTime<Utc>,
    total_patients: i64,
    rooms: &[Room],
) -> Result<DashboardStats, ApiError> {
    let history = stats::trailing_days(now, HISTORY_DAYS);
    let this_week = resolve_window(now, Granularity::Week);

    let totals = store.appointment_totals(now).await?;
    let recent = store.appointments_in(&history, None).await?;
    let sessions = store.dialysis_sessions_in(&this_week).await?;

    Ok(stats::compute(now, total_patients, rooms, totals, &recent, &sessions))
}

pub async fn dashboard(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<DashboardStats>>, ApiError> {
    let total_patients: i64 = sqlx::query_scalar("SELECT count(*) FROM patient")
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::db)?;

    let rooms = sqlx::query_as::<_, Room>(
        "SELECT room_id, room_number, capacity, room_type, is_available, created_at FROM room",
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    let stats = dashboard_stats(state.store.as_ref(), Utc::now(), total_patients, &rooms).await?;
    Ok(Json(ApiOk::new(stats)))
}
