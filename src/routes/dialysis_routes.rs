// src/routes/dialysis_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, DialysisSession, DialysisSessionPatch, NewDialysisSession, Role},
    routes::WindowQuery,
    scheduling::{list_in_window, CalendarWindow, OwnerFilter, WindowBounds},
    store::ScheduleStore,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dialysis/sessions", get(list_sessions).post(create_session))
        .route("/dialysis/sessions/{session_id}", patch(update_session))
}

const DIALYSIS_ROLES: [Role; 3] = [Role::Admin, Role::Doctor, Role::Nurse];

#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    #[serde(flatten)]
    pub window: WindowQuery,
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SessionList {
    pub window: WindowBounds,
    pub sessions: Vec<DialysisSession>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub dialysis_patient_id: Uuid,
    pub session_date: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub completed: Option<bool>,
    pub complications: Option<String>,
    pub notes: Option<String>,
}

fn validate_session_duration(minutes: Option<i32>) -> Result<(), ApiError> {
    match minutes {
        Some(m) if m <= 0 => Err(ApiError::validation("duration_minutes must be > 0")),
        _ => Ok(()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Sessions in `window`, most recent first.
async fn sessions_in_window(
    store: &dyn ScheduleStore,
    window: &CalendarWindow,
    patient_id: Option<Uuid>,
) -> Result<Vec<DialysisSession>, ApiError> {
    let candidates = store.dialysis_sessions_in(window).await?;
    let owners = OwnerFilter::from_params(patient_id, None, None);

    let mut sessions = list_in_window(candidates, &owners, window);
    sessions.sort_by(|a, b| b.session_date.cmp(&a.session_date));
    Ok(sessions)
}

pub async fn list_sessions(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<SessionListQuery>,
) -> Result<Json<ApiOk<SessionList>>, ApiError> {
    let (view, window) = q.window.resolve(Utc::now())?;
    let sessions = sessions_in_window(state.store.as_ref(), &window, q.patient_id).await?;

    Ok(Json(ApiOk::new(SessionList {
        window: WindowBounds::new(view, &window),
        sessions,
    })))
}

pub async fn create_session(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<ApiOk<DialysisSession>>, ApiError> {
    auth.require(&DIALYSIS_ROLES, "record dialysis sessions")?;
    validate_session_duration(req.duration_minutes)?;

    let patient_exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM patient WHERE patient_id = $1)")
            .bind(req.dialysis_patient_id)
            .fetch_one(&state.db)
            .await
            .map_err(ApiError::db)?;
    if !patient_exists {
        return Err(ApiError::not_found("patient"));
    }

    let new = NewDialysisSession {
        dialysis_patient_id: req.dialysis_patient_id,
        session_date: req.session_date,
        duration_minutes: req.duration_minutes,
        completed: req.completed.unwrap_or(false),
        complications: non_empty(req.complications),
        notes: non_empty(req.notes),
    };
    let session = state.store.insert_dialysis_session(&new).await?;

    tracing::info!(
        session_id = %session.session_id,
        patient_id = %session.dialysis_patient_id,
        "dialysis session recorded"
    );
    Ok(Json(ApiOk::new(session)))
}

pub async fn update_session(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
    Json(req): Json<DialysisSessionPatch>,
) -> Result<Json<ApiOk<DialysisSession>>, ApiError> {
    auth.require(&DIALYSIS_ROLES, "update dialysis sessions")?;
    validate_session_duration(req.duration_minutes)?;

    let patch = DialysisSessionPatch {
        complications: non_empty(req.complications),
        notes: non_empty(req.notes),
        ..req
    };
    let session = state
        .store
        .update_dialysis_session(session_id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("dialysis session"))?;

    Ok(Json(ApiOk::new(session)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::dialysis_session;
    use crate::scheduling::{resolve_window, Granularity};
    use crate::store::memory::MemoryStore;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).single().unwrap()
    }

    #[test]
    fn test_duration_must_be_positive_when_given() {
        assert!(validate_session_duration(None).is_ok());
        assert!(validate_session_duration(Some(240)).is_ok());
        assert_eq!(
            validate_session_duration(Some(0)).unwrap_err().code(),
            "VALIDATION_ERROR"
        );
    }

    #[tokio::test]
    async fn test_sessions_listed_most_recent_first_for_patient() {
        let patient = Uuid::new_v4();
        let store = MemoryStore::new()
            .with_session(dialysis_session(patient, at(4, 8)))
            .with_session(dialysis_session(patient, at(6, 8)))
            .with_session(dialysis_session(Uuid::new_v4(), at(5, 8)))
            .with_session(dialysis_session(patient, at(12, 8)));

        let week = resolve_window(at(5, 12), Granularity::Week);
        let sessions = sessions_in_window(&store, &week, Some(patient)).await.unwrap();

        let dates: Vec<_> = sessions.iter().map(|s| s.session_date).collect();
        assert_eq!(dates, vec![at(6, 8), at(4, 8)]);
    }

    #[tokio::test]
    async fn test_unbounded_window_without_owner_returns_everything() {
        let store = MemoryStore::new()
            .with_session(dialysis_session(Uuid::new_v4(), at(1, 8)))
            .with_session(dialysis_session(Uuid::new_v4(), at(30, 8)));

        let sessions = sessions_in_window(&store, &CalendarWindow::Unbounded, None)
            .await
            .unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_date, at(30, 8));
    }

    #[test]
    fn test_blank_notes_are_dropped() {
        assert_eq!(non_empty(Some("   ".into())), None);
        assert_eq!(non_empty(Some(" ok ".into())), Some("ok".into()));
    }
}
