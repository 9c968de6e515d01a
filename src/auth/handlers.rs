use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        extractors::AuthUser,
        jwt::{subject_user_id, JwtKeys},
        password::{check_policy, hash_password, verify_password, verify_unknown_user},
        repo_types::NewUser,
        services::{
            auth_response, is_valid_email, normalize_email, require_local_issuer,
        },
    },
    db::RepoError,
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).delete(delete_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let keys = JwtKeys::from_ref(&state);
    require_local_issuer(&keys)?;

    payload.email = normalize_email(&payload.email);
    let username = payload.username.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if username.is_empty() {
        return Err(ApiError::Validation("Username is required".into()));
    }
    check_policy(&payload.password)?;

    // Ensure email is not taken
    let existing = state.users.find_by_email(&payload.email).await.map_err(|e| {
        error!(error = %e, "find_by_email failed");
        ApiError::internal(e)
    })?;
    if existing.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::from(e)
    })?;

    let new_user = NewUser {
        email: payload.email,
        username,
        password_hash,
    };
    let user = match state.users.create(new_user).await {
        Ok(u) => u,
        // lost a race with a concurrent registration
        Err(RepoError::Conflict(_)) => {
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(ApiError::internal(e));
        }
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(auth_response(&keys, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    require_local_issuer(&keys)?;

    payload.email = normalize_email(&payload.email);
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let user = match state.users.find_by_email(&payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %payload.email, "login unknown email");
            verify_unknown_user(&payload.password);
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(ApiError::internal(e));
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, "verify_password failed");
        ApiError::from(e)
    })?;
    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    info!(user_id = %user.id, "user logged in");
    Ok(Json(auth_response(&keys, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    require_local_issuer(&keys)?;

    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;
    let user_id = subject_user_id(&claims)
        .ok_or_else(|| ApiError::Unauthorized("Invalid subject claim".into()))?;

    let user = state
        .users
        .find_by_id(user_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    Ok(Json(auth_response(&keys, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| {
            error!(user_id = %user_id, "user not found");
            ApiError::Unauthorized("User not found".into())
        })?;
    Ok(Json(PublicUser::from(user)))
}

/// Deletes the caller's account; valuations and comparables go with it.
#[instrument(skip(state))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<StatusCode, ApiError> {
    let removed = state.users.delete(user_id).await.map_err(ApiError::internal)?;
    if !removed {
        return Err(ApiError::Unauthorized("User not found".into()));
    }
    info!(%user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
