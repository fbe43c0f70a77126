// src/routes/auth_routes.rs

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    auth::{issue_token, verify_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::*,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

#[derive(Debug, sqlx::FromRow)]
struct SessionTokenRow {
    session_token_id: Uuid,
    expires_at: DateTime<Utc>,
}

fn profile(user: &UserRow) -> UserProfile {
    UserProfile {
        user_id: user.user_id,
        username: user.username.clone(),
        display_name: user.display_name.clone(),
        role: user.role,
    }
}

async fn load_user(state: &AppState, user_id: Uuid) -> Result<UserRow, ApiError> {
    sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, username, display_name, password_hash, role, is_active
        FROM app_user
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginResponseData>>, ApiError> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("username and password are required"));
    }

    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, username, display_name, password_hash, role, is_active
        FROM app_user
        WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::invalid_credentials)?;

    if !verify_password(&req.password, &user.password_hash) {
        tracing::info!(%username, "login rejected");
        return Err(ApiError::invalid_credentials());
    }
    if !user.is_active {
        return Err(ApiError::Forbidden("FORBIDDEN", "Account is disabled".into()));
    }

    let issued = issue_token();
    let expires_at = Utc::now() + Duration::hours(state.session_ttl_hours);

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        INSERT INTO session_token (user_id, session_token_hash, device_name, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING session_token_id, expires_at
        "#,
    )
    .bind(user.user_id)
    .bind(&issued.hash)
    .bind(req.device_name.as_deref())
    .bind(expires_at)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    sqlx::query(r#"UPDATE app_user SET last_login_at = now() WHERE user_id = $1"#)
        .bind(user.user_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    tracing::info!(user_id = %user.user_id, session = %session.session_token_id, "login");

    Ok(Json(ApiOk::new(LoginResponseData {
        access_token: issued.token,
        expires_at: session.expires_at,
        user: profile(&user),
    })))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<MeResponseData>>, ApiError> {
    let user = load_user(&state, auth.user_id).await?;

    let expires_at: DateTime<Utc> = sqlx::query_scalar(
        r#"SELECT expires_at FROM session_token WHERE session_token_id = $1"#,
    )
    .bind(auth.session_token_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk::new(MeResponseData {
        user: profile(&user),
        session: SessionInfo {
            session_token_id: auth.session_token_id,
            expires_at,
        },
    })))
}

/// Rotates the bearer token of the current session; the old token stops
/// working immediately.
pub async fn refresh(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<LoginResponseData>>, ApiError> {
    let user = load_user(&state, auth.user_id).await?;
    let issued = issue_token();
    let expires_at = Utc::now() + Duration::hours(state.session_ttl_hours);

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        UPDATE session_token
        SET session_token_hash = $2,
            expires_at = $3
        WHERE session_token_id = $1
          AND revoked_at IS NULL
        RETURNING session_token_id, expires_at
        "#,
    )
    .bind(auth.session_token_id)
    .bind(&issued.hash)
    .bind(expires_at)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    Ok(Json(ApiOk::new(LoginResponseData {
        access_token: issued.token,
        expires_at: session.expires_at,
        user: profile(&user),
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE session_token_id = $1
          AND revoked_at IS NULL
        "#,
    )
    .bind(auth.session_token_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk::new(OkData { ok: true })))
}
