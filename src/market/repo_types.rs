use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A historical sale. Reference data, never written by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub id: Uuid,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub condition_score: i32, // 0-10, not enforced
    pub mileage: i32,
    pub sold_price: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub sold_date: OffsetDateTime,
}
