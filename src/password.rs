//! Password policy and Argon2 hashing, shared with the `seed_admin` binary.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn is_long_enough(password: &str) -> bool {
    password.trim().len() >= MIN_PASSWORD_LEN
}

/// Argon2id PHC string with a fresh salt.
pub fn hash(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
}
