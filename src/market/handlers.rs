use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::MarketQuery;
use super::repo_types::MarketData;
use super::services;
use crate::{error::ApiError, state::AppState};

pub fn market_routes() -> Router<AppState> {
    Router::new()
        .route("/market", get(search_market))
        .route("/market/:id", get(get_market_record))
}

#[instrument(skip(state))]
pub async fn search_market(
    State(state): State<AppState>,
    Query(query): Query<MarketQuery>,
) -> Result<Json<Vec<MarketData>>, ApiError> {
    let (filter, page) = query.into_parts().map_err(ApiError::Validation)?;
    let rows = services::search(state.market.as_ref(), filter, page)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn get_market_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MarketData>, ApiError> {
    services::get_by_id(state.market.as_ref(), id)
        .await
        .map_err(ApiError::internal)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("market record", id))
}
