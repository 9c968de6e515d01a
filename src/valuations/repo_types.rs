use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::market::repo_types::MarketData;
use crate::prediction::CarAttributes;

/// A stored prediction request and its result. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub input_brand: String,
    pub input_model: String,
    pub input_year: i32,
    pub input_condition_score: i32,
    pub input_mileage: i32,
    pub predicted_price: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Link between a valuation and one market record used as a neighbor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparable {
    pub id: Uuid,
    pub valuation_id: Uuid,
    pub market_data_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_data: Option<MarketData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationDetails {
    #[serde(flatten)]
    pub valuation: Valuation,
    pub valuation_neighbors: Vec<Comparable>,
}

/// Everything needed to persist a valuation; id and time are set by the caller.
#[derive(Debug, Clone)]
pub struct NewValuation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub car: CarAttributes,
    pub predicted_price: i32,
    pub created_at: OffsetDateTime,
}

impl NewValuation {
    pub fn to_valuation(&self) -> Valuation {
        Valuation {
            id: self.id,
            user_id: self.user_id,
            input_brand: self.car.brand.clone(),
            input_model: self.car.model.clone(),
            input_year: self.car.year,
            input_condition_score: self.car.condition_score,
            input_mileage: self.car.mileage,
            predicted_price: self.predicted_price,
            created_at: self.created_at,
        }
    }
}
