use lazy_static::lazy_static;
use regex::Regex;
use tracing::error;
use uuid::Uuid;

use super::dto::{AuthResponse, PublicUser};
use super::jwt::JwtKeys;
use super::repo_types::User;
use crate::error::ApiError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Issuing endpoints only exist when this service holds the signing key.
pub(crate) fn require_local_issuer(keys: &JwtKeys) -> Result<(), ApiError> {
    if keys.can_sign() {
        Ok(())
    } else {
        Err(ApiError::NotImplemented(
            "tokens are issued by the identity provider".into(),
        ))
    }
}

fn sign_pair(keys: &JwtKeys, user_id: Uuid) -> Result<(String, String), ApiError> {
    let access = keys.sign_access(user_id).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        ApiError::internal(e)
    })?;
    let refresh = keys.sign_refresh(user_id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        ApiError::internal(e)
    })?;
    Ok((access, refresh))
}

pub(crate) fn auth_response(keys: &JwtKeys, user: User) -> Result<AuthResponse, ApiError> {
    let (access_token, refresh_token) = sign_pair(keys, user.id)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}
