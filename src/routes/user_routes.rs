// src/routes/user_routes.rs

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{hash_password, validate_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Role},
};

const USER_COLUMNS: &str = "user_id, username, display_name, role, is_active, created_at";

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserPublicRow {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub role: Role,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{user_id}", get(get_user).patch(update_user))
        .route("/{user_id}/disable", post(disable_user))
        .route("/{user_id}/enable", post(enable_user))
}

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    auth.require(&[Role::Admin], "manage users")
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    let u = username.trim();
    if u.len() < 3 {
        return Err(ApiError::validation("username must be at least 3 characters"));
    }
    if u.chars().any(char::is_whitespace) {
        return Err(ApiError::validation("username must not contain spaces"));
    }
    Ok(())
}

fn validate_display_name(display_name: &str) -> Result<(), ApiError> {
    if display_name.trim().is_empty() {
        return Err(ApiError::validation("display_name is required"));
    }
    Ok(())
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<UserPublicRow>>>, ApiError> {
    ensure_admin(&auth)?;

    let sql = format!("SELECT {USER_COLUMNS} FROM app_user ORDER BY created_at DESC LIMIT 500");
    let users = sqlx::query_as::<_, UserPublicRow>(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk::new(users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiOk<UserPublicRow>>, ApiError> {
    ensure_admin(&auth)?;

    let sql = format!("SELECT {USER_COLUMNS} FROM app_user WHERE user_id = $1");
    let user = sqlx::query_as::<_, UserPublicRow>(&sql)
        .bind(user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("user"))?;

    Ok(Json(ApiOk::new(user)))
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiOk<UserPublicRow>>, ApiError> {
    ensure_admin(&auth)?;
    validate_username(&req.username)?;
    validate_display_name(&req.display_name)?;
    validate_password(&req.password)?;

    let password_hash = hash_password(&req.password)?;

    let sql = format!(
        r#"
        INSERT INTO app_user (username, display_name, password_hash, role, is_active)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (username) DO NOTHING
        RETURNING {USER_COLUMNS}
        "#
    );
    let user = sqlx::query_as::<_, UserPublicRow>(&sql)
        .bind(req.username.trim())
        .bind(req.display_name.trim())
        .bind(&password_hash)
        .bind(req.role)
        .bind(req.is_active.unwrap_or(true))
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::Conflict("USERNAME_TAKEN", "username already exists".into()))?;

    tracing::info!(user_id = %user.user_id, role = user.role.as_str(), "user created");
    Ok(Json(ApiOk::new(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiOk<UserPublicRow>>, ApiError> {
    ensure_admin(&auth)?;
    if let Some(d) = req.display_name.as_deref() {
        validate_display_name(d)?;
    }
    if user_id == auth.user_id && (req.role.is_some_and(|r| r != Role::Admin) || req.is_active == Some(false)) {
        return Err(ApiError::validation("admins cannot demote or disable themselves"));
    }

    let sql = format!(
        r#"
        UPDATE app_user
        SET display_name = COALESCE($2, display_name),
            role         = COALESCE($3, role),
            is_active    = COALESCE($4, is_active),
            updated_at   = now()
        WHERE user_id = $1
        RETURNING {USER_COLUMNS}
        "#
    );
    let user = sqlx::query_as::<_, UserPublicRow>(&sql)
        .bind(user_id)
        .bind(req.display_name.as_deref().map(str::trim))
        .bind(req.role)
        .bind(req.is_active)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("user"))?;

    Ok(Json(ApiOk::new(user)))
}

async fn set_active(
    state: &AppState,
    auth: &AuthContext,
    user_id: Uuid,
    is_active: bool,
) -> Result<UserPublicRow, ApiError> {
    ensure_admin(auth)?;
    if user_id == auth.user_id && !is_active {
        return Err(ApiError::validation("admins cannot disable themselves"));
    }

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let sql = format!(
        r#"
        UPDATE app_user
        SET is_active = $2, updated_at = now()
        WHERE user_id = $1
        RETURNING {USER_COLUMNS}
        "#
    );
    let user = sqlx::query_as::<_, UserPublicRow>(&sql)
        .bind(user_id)
        .bind(is_active)
        .fetch_optional(&mut *tx)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("user"))?;

    if !is_active {
        // Disabled accounts lose every open session
        sqlx::query(
            r#"
            UPDATE session_token
            SET revoked_at = now()
            WHERE user_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::db)?;
    }

    tx.commit().await.map_err(ApiError::db)?;
    Ok(user)
}

pub async fn disable_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiOk<UserPublicRow>>, ApiError> {
    Ok(Json(ApiOk::new(set_active(&state, &auth, user_id, false).await?)))
}

pub async fn enable_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiOk<UserPublicRow>>, ApiError> {
    Ok(Json(ApiOk::new(set_active(&state, &auth, user_id, true).await?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("front desk").is_err());
        assert!(validate_username("frontdesk").is_ok());
    }

    #[test]
    fn test_create_request_parses_role_name() {
        let req: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "username": "drhouse",
            "display_name": "Dr House",
            "password": "secret123",
            "role": "doctor"
        }))
        .unwrap();
        assert_eq!(req.role, Role::Doctor);
        assert_eq!(req.is_active, None);
    }
}
