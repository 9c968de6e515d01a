//! The price prediction collaborator.
//!
//! A prediction is a price plus the market records the model treated as
//! nearest neighbors. The service only depends on [`PredictionClient`];
//! which implementation runs is decided by configuration.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

mod comparables;
mod http;

pub use comparables::ComparablesPredictor;
pub use http::HttpPredictionClient;

/// The five attributes a caller describes a car with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarAttributes {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub mileage: i32,
    pub condition_score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub predicted_price: i32,
    /// Market record ids, nearest first.
    pub neighbors: Vec<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("prediction request timed out")]
    Timeout,
    #[error("prediction service unavailable: {0}")]
    Unavailable(String),
    #[error("invalid prediction response: {0}")]
    InvalidResponse(String),
    #[error("no market data to compare against")]
    NoMarketData,
}

#[async_trait]
pub trait PredictionClient: Send + Sync {
    async fn predict(&self, car: &CarAttributes) -> Result<Prediction, PredictionError>;
}
