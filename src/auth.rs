//! Password hashing and opaque session tokens.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::password::{self, MIN_PASSWORD_LEN};

/// Argon2 check against a PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Argon2id PHC string with a fresh salt, for `app_user.password_hash`.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    password::hash(password).map_err(|e| ApiError::Internal(format!("argon2 hash error: {e}")))
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if !password::is_long_enough(password) {
        return Err(ApiError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// A bearer token handed to the client and the digest kept in the DB.
pub struct IssuedToken {
    pub token: String,
    pub hash: String,
}

pub fn issue_token() -> IssuedToken {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);
    let hash = hash_token(&token);
    IssuedToken { token, hash }
}

/// SHA-256 hex of a bearer token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
