//! Argon2 password hashing and the password policy.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password too short")]
    TooShort,
    #[error("argon2: {0}")]
    Hash(String),
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort => ApiError::Validation(err.to_string()),
            PasswordError::Hash(_) => ApiError::internal(err),
        }
    }
}

pub fn check_policy(plain: &str) -> Result<(), PasswordError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(PasswordError::TooShort);
    }
    Ok(())
}

pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            PasswordError::Hash(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        PasswordError::Hash(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

lazy_static! {
    static ref UNKNOWN_USER_HASH: Option<String> = hash_password("no account has this password").ok();
}

/// Spends one verification on a fixed hash, so a login for an unknown
/// email costs the same as one with a wrong password.
pub fn verify_unknown_user(plain: &str) {
    if let Some(hash) = UNKNOWN_USER_HASH.as_deref() {
        let _ = verify_password(plain, hash);
    }
}
