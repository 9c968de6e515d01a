use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::ValuationRequest;
use super::repo_types::{Valuation, ValuationDetails};
use super::services::ValuationWorkflow;
use crate::{auth::AuthUser, error::ApiError, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/valuation/history", get(get_valuation_history))
        .route("/valuation/:id", get(get_valuation))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/valuation/predict", post(create_prediction))
}

pub fn location_of(id: Uuid) -> String {
    format!("/api/valuation/{id}")
}

/// POST /valuation/predict
#[instrument(skip(state, body))]
pub async fn create_prediction(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<ValuationRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Valuation>), ApiError> {
    let valuation = ValuationWorkflow::from_state(&state)
        .create_valuation(user_id, body)
        .await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::LOCATION,
        HeaderValue::from_str(&location_of(valuation.id)).map_err(ApiError::internal)?,
    );
    Ok((StatusCode::CREATED, headers, Json(valuation)))
}

#[instrument(skip(state))]
pub async fn get_valuation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ValuationDetails>, ApiError> {
    ValuationWorkflow::from_state(&state)
        .get_valuation(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("valuation", id))
}

#[instrument(skip(state))]
pub async fn get_valuation_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<ValuationDetails>>, ApiError> {
    let history = ValuationWorkflow::from_state(&state)
        .get_valuation_history(user_id)
        .await?;
    Ok(Json(history))
}
