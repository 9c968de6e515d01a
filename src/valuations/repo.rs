use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::repo_types::{Comparable, NewValuation, Valuation, ValuationDetails};
use crate::db::RepoError;
use crate::market::repo_types::MarketData;

/// FK from `valuations` to `users`; any other missing reference is a neighbor.
pub const USER_FK: &str = "valuations_user_id_fkey";

#[async_trait]
pub trait ValuationRepo: Send + Sync {
    /// Insert a valuation and its neighbor links as one unit: either all
    /// rows become visible or none do.
    async fn insert(&self, valuation: &NewValuation, neighbors: &[Uuid]) -> Result<Valuation, RepoError>;
    /// Valuation with every comparable expanded to its market record.
    async fn get_expanded(&self, id: Uuid) -> Result<Option<ValuationDetails>, RepoError>;
    /// A user's valuations, newest first, comparables not expanded.
    async fn history(&self, user_id: Uuid) -> Result<Vec<ValuationDetails>, RepoError>;
}

#[derive(Clone)]
pub struct PgValuationRepo {
    db: PgPool,
}

impl PgValuationRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct NeighborRow {
    id: Uuid,
    valuation_id: Uuid,
    market_data_id: Uuid,
}

impl From<NeighborRow> for Comparable {
    fn from(r: NeighborRow) -> Self {
        Self {
            id: r.id,
            valuation_id: r.valuation_id,
            market_data_id: r.market_data_id,
            market_data: None,
        }
    }
}

#[derive(Debug, FromRow)]
struct ExpandedNeighborRow {
    neighbor_id: Uuid,
    valuation_id: Uuid,
    #[sqlx(flatten)]
    market: MarketData,
}

impl From<ExpandedNeighborRow> for Comparable {
    fn from(r: ExpandedNeighborRow) -> Self {
        Self {
            id: r.neighbor_id,
            valuation_id: r.valuation_id,
            market_data_id: r.market.id,
            market_data: Some(r.market),
        }
    }
}

const VALUATION_COLUMNS: &str = "id, user_id, input_brand, input_model, input_year, \
     input_condition_score, input_mileage, predicted_price, created_at";

#[async_trait]
impl ValuationRepo for PgValuationRepo {
    async fn insert(&self, v: &NewValuation, neighbors: &[Uuid]) -> Result<Valuation, RepoError> {
        let mut tx = self.db.begin().await?;

        let valuation = sqlx::query_as::<_, Valuation>(&format!(
            r#"
            INSERT INTO valuations ({VALUATION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {VALUATION_COLUMNS}
            "#
        ))
        .bind(v.id)
        .bind(v.user_id)
        .bind(&v.car.brand)
        .bind(&v.car.model)
        .bind(v.car.year)
        .bind(v.car.condition_score)
        .bind(v.car.mileage)
        .bind(v.predicted_price)
        .bind(v.created_at)
        .fetch_one(&mut *tx)
        .await?;

        if !neighbors.is_empty() {
            let ids: Vec<Uuid> = neighbors.iter().map(|_| Uuid::new_v4()).collect();
            let ranks: Vec<i32> = (0..neighbors.len() as i32).collect();
            sqlx::query(
                r#"
                INSERT INTO valuation_neighbors (id, valuation_id, market_data_id, neighbor_rank)
                SELECT n.id, $2, n.market_data_id, n.neighbor_rank
                FROM UNNEST($1::uuid[], $3::uuid[], $4::int[]) AS n(id, market_data_id, neighbor_rank)
                "#,
            )
            .bind(&ids)
            .bind(v.id)
            .bind(neighbors)
            .bind(&ranks)
            .execute(&mut *tx)
            .await?;
        }

        // dropping tx without commit rolls everything back
        tx.commit().await?;
        Ok(valuation)
    }

    async fn get_expanded(&self, id: Uuid) -> Result<Option<ValuationDetails>, RepoError> {
        let Some(valuation) = sqlx::query_as::<_, Valuation>(&format!(
            "SELECT {VALUATION_COLUMNS} FROM valuations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, ExpandedNeighborRow>(
            r#"
            SELECT n.id AS neighbor_id, n.valuation_id,
                   m.id, m.brand, m.model, m.year, m.condition_score, m.mileage,
                   m.sold_price, m.sold_date
            FROM valuation_neighbors n
            JOIN market_data m ON m.id = n.market_data_id
            WHERE n.valuation_id = $1
            ORDER BY n.neighbor_rank
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(Some(ValuationDetails {
            valuation,
            valuation_neighbors: rows.into_iter().map(Comparable::from).collect(),
        }))
    }

    async fn history(&self, user_id: Uuid) -> Result<Vec<ValuationDetails>, RepoError> {
        let valuations = sqlx::query_as::<_, Valuation>(&format!(
            r#"
            SELECT {VALUATION_COLUMNS}
            FROM valuations
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        if valuations.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = valuations.iter().map(|v| v.id).collect();
        let rows = sqlx::query_as::<_, NeighborRow>(
            r#"
            SELECT id, valuation_id, market_data_id
            FROM valuation_neighbors
            WHERE valuation_id = ANY($1)
            ORDER BY valuation_id, neighbor_rank
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut by_valuation: HashMap<Uuid, Vec<Comparable>> = HashMap::new();
        for row in rows {
            by_valuation
                .entry(row.valuation_id)
                .or_default()
                .push(row.into());
        }

        Ok(valuations
            .into_iter()
            .map(|valuation| {
                let valuation_neighbors = by_valuation.remove(&valuation.id).unwrap_or_default();
                ValuationDetails {
                    valuation,
                    valuation_neighbors,
                }
            })
            .collect())
    }
}

