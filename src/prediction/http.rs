use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{CarAttributes, Prediction, PredictionClient, PredictionError};

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predicted_price: i32,
    #[serde(default)]
    neighbors: Vec<NeighborRef>,
}

#[derive(Debug, Deserialize)]
struct NeighborRef {
    market_data_id: Uuid,
}

/// Calls the hosted nearest-neighbor model. One attempt per prediction.
#[derive(Clone)]
pub struct HttpPredictionClient {
    client: Client,
    url: String,
}

impl HttpPredictionClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build prediction http client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

fn classify(err: reqwest::Error) -> PredictionError {
    if err.is_timeout() {
        PredictionError::Timeout
    } else if err.is_decode() {
        PredictionError::InvalidResponse(err.to_string())
    } else {
        PredictionError::Unavailable(err.to_string())
    }
}

impl From<PredictResponse> for Prediction {
    fn from(r: PredictResponse) -> Self {
        Self {
            predicted_price: r.predicted_price,
            neighbors: r.neighbors.into_iter().map(|n| n.market_data_id).collect(),
        }
    }
}

#[async_trait]
impl PredictionClient for HttpPredictionClient {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn predict(&self, car: &CarAttributes) -> Result<Prediction, PredictionError> {
        let res = self
            .client
            .post(&self.url)
            .json(car)
            .send()
            .await
            .map_err(classify)?;

        let status = res.status();
        if !status.is_success() {
            return Err(PredictionError::Unavailable(format!("status {status}")));
        }

        let body: PredictResponse = res.json().await.map_err(classify)?;
        if body.predicted_price < 0 {
            return Err(PredictionError::InvalidResponse(format!(
                "negative price {}",
                body.predicted_price
            )));
        }
        debug!(
            predicted_price = body.predicted_price,
            neighbors = body.neighbors.len(),
            "prediction received"
        );
        Ok(body.into())
    }
}
