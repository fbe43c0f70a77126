use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::hash_token;
use crate::error::ApiError;
use crate::models::{AppState, Role};

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub session_token_id: Uuid,
}

impl AuthContext {
    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }

    /// Doctor filter for schedule reads. Doctors are pinned to their own id
    /// and may not ask for another doctor; other staff get `requested` as is.
    pub fn doctor_scope(&self, requested: Option<Uuid>) -> Result<Option<Uuid>, ApiError> {
        if !self.is(Role::Doctor) {
            return Ok(requested);
        }
        match requested {
            Some(id) if id != self.user_id => Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Doctor can only view their own schedule".into(),
            )),
            _ => Ok(Some(self.user_id)),
        }
    }

    /// Forbids callers whose role is not in `allowed`.
    pub fn require(&self, allowed: &[Role], action: &str) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            let names: Vec<&str> = allowed.iter().map(|r| r.as_str()).collect();
            Err(ApiError::Forbidden(
                "FORBIDDEN",
                format!("Only {} can {action}", names.join("/")),
            ))
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionLookupRow {
    session_token_id: Uuid,
    user_id: Uuid,
    role: Role,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_token(authz.token());

            // Live, unrevoked session of an active user
            let row: SessionLookupRow = sqlx::query_as::<_, SessionLookupRow>(
                r#"
                SELECT st.session_token_id, st.user_id, u.role
                FROM session_token st
                JOIN app_user u ON u.user_id = st.user_id
                WHERE st.session_token_hash = $1
                  AND st.revoked_at IS NULL
                  AND st.expires_at > now()
                  AND u.is_active = true
                "#,
            )
            .bind(&token_hash)
            .fetch_optional(&state.db)
            .await
            .map_err(ApiError::db)?
            .ok_or_else(ApiError::session_expired)?;

            // best-effort
            if let Err(e) = sqlx::query(
                r#"
                UPDATE session_token
                SET last_seen_at = now()
                WHERE session_token_id = $1
                "#,
            )
            .bind(row.session_token_id)
            .execute(&state.db)
            .await
            {
                tracing::debug!(error = %e, "failed to touch session");
            }

            Ok(AuthContext {
                user_id: row.user_id,
                role: row.role,
                session_token_id: row.session_token_id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            role,
            session_token_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_require_roles() {
        let staff = [Role::Admin, Role::Receptionist];
        assert!(ctx(Role::Admin).require(&staff, "manage rooms").is_ok());

        let err = ctx(Role::Nurse).require(&staff, "manage rooms").unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
        match err {
            ApiError::Forbidden(_, msg) => assert_eq!(msg, "Only admin/receptionist can manage rooms"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_doctor_scope_pins_doctors_to_themselves() {
        let doctor = ctx(Role::Doctor);
        assert_eq!(doctor.doctor_scope(None).unwrap(), Some(doctor.user_id));
        assert_eq!(doctor.doctor_scope(Some(doctor.user_id)).unwrap(), Some(doctor.user_id));
        assert_eq!(
            doctor.doctor_scope(Some(Uuid::new_v4())).unwrap_err().code(),
            "FORBIDDEN"
        );

        let reception = ctx(Role::Receptionist);
        let other = Uuid::new_v4();
        assert_eq!(reception.doctor_scope(Some(other)).unwrap(), Some(other));
        assert_eq!(reception.doctor_scope(None).unwrap(), None);
    }
}
