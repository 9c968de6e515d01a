use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::MarketData;
use super::services::{MarketFilter, Page};
use crate::db::RepoError;

#[async_trait]
pub trait MarketRepo: Send + Sync {
    async fn search(&self, filter: &MarketFilter, page: Option<Page>) -> Result<Vec<MarketData>, RepoError>;
    async fn get(&self, id: Uuid) -> Result<Option<MarketData>, RepoError>;
}

#[derive(Clone)]
pub struct PgMarketRepo {
    db: PgPool,
}

impl PgMarketRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MarketRepo for PgMarketRepo {
    async fn search(&self, filter: &MarketFilter, page: Option<Page>) -> Result<Vec<MarketData>, RepoError> {
        let (mileage_min, mileage_max) = filter.mileage_bounds().unzip();
        let (price_min, price_max): (Option<Decimal>, Option<Decimal>) =
            filter.sold_price_bounds().unzip();

        // A NULL parameter disables its predicate; NULL limit means ALL.
        let rows = sqlx::query_as::<_, MarketData>(
            r#"
            SELECT id, brand, model, year, condition_score, mileage, sold_price, sold_date
            FROM market_data
            WHERE ($1::text IS NULL OR brand = $1)
              AND ($2::text IS NULL OR model = $2)
              AND ($3::int IS NULL OR year = $3)
              AND ($4::int IS NULL OR condition_score = $4)
              AND ($5::int IS NULL OR mileage BETWEEN $5 AND $6)
              AND ($7::numeric IS NULL OR sold_price BETWEEN $7 AND $8)
            ORDER BY sold_date DESC, id
            LIMIT $9 OFFSET $10
            "#,
        )
        .bind(filter.brand.as_deref())
        .bind(filter.model.as_deref())
        .bind(filter.year)
        .bind(filter.condition_score)
        .bind(mileage_min)
        .bind(mileage_max)
        .bind(price_min)
        .bind(price_max)
        .bind(page.map(|p| p.limit))
        .bind(page.map_or(0, |p| p.offset))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<MarketData>, RepoError> {
        let row = sqlx::query_as::<_, MarketData>(
            r#"
            SELECT id, brand, model, year, condition_score, mileage, sold_price, sold_date
            FROM market_data
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }
}
