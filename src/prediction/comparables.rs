use std::{cmp::Ordering, sync::Arc};

use async_trait::async_trait;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use tracing::{debug, instrument};

use super::{CarAttributes, Prediction, PredictionClient, PredictionError};
use crate::market::{repo::MarketRepo, repo_types::MarketData, services::MarketFilter};

const YEAR_SCALE: f64 = 3.0;
const MILEAGE_SCALE: f64 = 15_000.0;
const CONDITION_SCALE: f64 = 2.0;
const BRAND_MISMATCH: f64 = 4.0;
const MODEL_MISMATCH: f64 = 2.0;

/// Development stand-in for the hosted model: ranks existing market
/// records by a scaled distance and averages the `k` closest sale prices.
#[derive(Clone)]
pub struct ComparablesPredictor {
    market: Arc<dyn MarketRepo>,
    k: usize,
}

impl ComparablesPredictor {
    pub fn new(market: Arc<dyn MarketRepo>, k: usize) -> Self {
        Self { market, k: k.max(1) }
    }

    /// Narrowest non-empty candidate pool: same model, then same brand, then anything.
    async fn candidates(&self, car: &CarAttributes) -> Result<Vec<MarketData>, PredictionError> {
        let pools = [
            MarketFilter {
                brand: Some(car.brand.clone()),
                model: Some(car.model.clone()),
                ..Default::default()
            },
            MarketFilter {
                brand: Some(car.brand.clone()),
                ..Default::default()
            },
            MarketFilter::default(),
        ];
        for filter in pools {
            let rows = self
                .market
                .search(&filter, None)
                .await
                .map_err(|e| PredictionError::Unavailable(e.to_string()))?;
            if rows.len() >= self.k || filter == MarketFilter::default() {
                return Ok(rows);
            }
        }
        Ok(Vec::new())
    }
}

/// Difference taken in `f64`; inputs are unvalidated and may span all of `i32`.
fn scaled_gap(a: i32, b: i32, scale: f64) -> f64 {
    (f64::from(a) - f64::from(b)) / scale
}

pub(crate) fn distance(car: &CarAttributes, r: &MarketData) -> f64 {
    let dy = scaled_gap(car.year, r.year, YEAR_SCALE);
    let dm = scaled_gap(car.mileage, r.mileage, MILEAGE_SCALE);
    let dc = scaled_gap(car.condition_score, r.condition_score, CONDITION_SCALE);
    let mut d = (dy * dy + dm * dm + dc * dc).sqrt();
    if !r.brand.eq_ignore_ascii_case(&car.brand) {
        d += BRAND_MISMATCH;
    }
    if !r.model.eq_ignore_ascii_case(&car.model) {
        d += MODEL_MISMATCH;
    }
    d
}

fn mean_price(rows: &[&MarketData]) -> Option<i32> {
    let n = Decimal::from(rows.len() as u64);
    if n.is_zero() {
        return None;
    }
    let total: Decimal = rows.iter().map(|r| r.sold_price).sum();
    (total / n).round().to_i32()
}

#[async_trait]
impl PredictionClient for ComparablesPredictor {
    #[instrument(skip(self))]
    async fn predict(&self, car: &CarAttributes) -> Result<Prediction, PredictionError> {
        let pool = self.candidates(car).await?;
        if pool.is_empty() {
            return Err(PredictionError::NoMarketData);
        }

        let mut ranked: Vec<(f64, &MarketData)> = pool.iter().map(|r| (distance(car, r), r)).collect();
        ranked.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        ranked.truncate(self.k);

        let nearest: Vec<&MarketData> = ranked.iter().map(|(_, r)| *r).collect();
        let predicted_price = mean_price(&nearest)
            .ok_or_else(|| PredictionError::InvalidResponse("price out of range".into()))?;

        debug!(predicted_price, neighbors = nearest.len(), "comparables prediction");
        Ok(Prediction {
            predicted_price,
            neighbors: nearest.iter().map(|r| r.id).collect(),
        })
    }
}
