use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::ValuationRequest;
use super::repo::{ValuationRepo, USER_FK};
use super::repo_types::{NewValuation, Valuation, ValuationDetails};
use crate::{
    auth::repo::UserRepo,
    db::RepoError,
    error::ApiError,
    prediction::{PredictionClient, PredictionError},
    state::AppState,
};

#[derive(Debug, thiserror::Error)]
pub enum ValuationError {
    #[error("caller is not a known user")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
    #[error("prediction referenced an unknown market record ({0})")]
    UnknownNeighbor(String),
    #[error(transparent)]
    Store(#[from] RepoError),
}

impl From<ValuationError> for ApiError {
    fn from(err: ValuationError) -> Self {
        match err {
            ValuationError::Unauthorized => ApiError::Unauthorized("User not found".into()),
            ValuationError::Validation(msg) => ApiError::Validation(msg),
            ValuationError::Prediction(PredictionError::Timeout) => ApiError::UpstreamTimeout,
            ValuationError::Prediction(e) => ApiError::Upstream(e.to_string()),
            e @ ValuationError::UnknownNeighbor(_) => ApiError::Upstream(e.to_string()),
            ValuationError::Store(e) => ApiError::internal(e),
        }
    }
}

/// Current UTC time at the storage precision (microseconds).
fn server_now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

/// Creates and reads valuations. Built per request from explicit dependencies.
pub struct ValuationWorkflow<'a> {
    users: &'a dyn UserRepo,
    valuations: &'a dyn ValuationRepo,
    predictor: &'a dyn PredictionClient,
}

impl<'a> ValuationWorkflow<'a> {
    pub fn new(
        users: &'a dyn UserRepo,
        valuations: &'a dyn ValuationRepo,
        predictor: &'a dyn PredictionClient,
    ) -> Self {
        Self {
            users,
            valuations,
            predictor,
        }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(
            state.users.as_ref(),
            state.valuations.as_ref(),
            state.predictor.as_ref(),
        )
    }

    /// Predict, then persist the valuation with its comparables in one unit.
    /// Nothing is written unless the prediction succeeded, and nothing is retried.
    #[instrument(skip(self, request))]
    pub async fn create_valuation(
        &self,
        user_id: Uuid,
        request: ValuationRequest,
    ) -> Result<Valuation, ValuationError> {
        if self.users.find_by_id(user_id).await?.is_none() {
            warn!(%user_id, "token subject is not a user");
            return Err(ValuationError::Unauthorized);
        }
        request.validate().map_err(ValuationError::Validation)?;
        let car = request.into_attributes();

        let prediction = self.predictor.predict(&car).await?;

        let new = NewValuation {
            id: Uuid::new_v4(),
            user_id,
            car,
            predicted_price: prediction.predicted_price,
            created_at: server_now(),
        };
        let valuation = match self.valuations.insert(&new, &prediction.neighbors).await {
            Ok(v) => v,
            // the user went away after the existence check above
            Err(RepoError::MissingReference(c)) if c == USER_FK => {
                warn!(%user_id, "user deleted while valuing");
                return Err(ValuationError::Unauthorized);
            }
            Err(RepoError::MissingReference(c)) => return Err(ValuationError::UnknownNeighbor(c)),
            Err(e) => return Err(e.into()),
        };

        info!(
            valuation_id = %valuation.id,
            predicted_price = valuation.predicted_price,
            neighbors = prediction.neighbors.len(),
            "valuation created"
        );
        Ok(valuation)
    }

    pub async fn get_valuation(&self, id: Uuid) -> Result<Option<ValuationDetails>, ValuationError> {
        Ok(self.valuations.get_expanded(id).await?)
    }

    pub async fn get_valuation_history(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ValuationDetails>, ValuationError> {
        Ok(self.valuations.history(user_id).await?)
    }
}
