use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use super::repo::MarketRepo;
use super::repo_types::MarketData;
use crate::db::RepoError;

/// Half-width of the mileage and sold price windows.
pub const RANGE_TOLERANCE: i32 = 3000;

/// Market search criteria. Every present field narrows the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketFilter {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub condition_score: Option<i32>,
    pub mileage: Option<i32>,
    pub sold_price: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

/// Inclusive `[v - 3000, v + 3000]`, lower end floored at zero.
pub fn tolerance_window(value: i32) -> (i32, i32) {
    (
        value.saturating_sub(RANGE_TOLERANCE).max(0),
        value.saturating_add(RANGE_TOLERANCE),
    )
}

impl MarketFilter {
    pub fn mileage_bounds(&self) -> Option<(i32, i32)> {
        self.mileage.map(tolerance_window)
    }

    pub fn sold_price_bounds(&self) -> Option<(Decimal, Decimal)> {
        self.sold_price.map(|p| {
            let (lo, hi) = tolerance_window(p);
            (Decimal::from(lo), Decimal::from(hi))
        })
    }

    /// Blank strings carry no constraint.
    pub fn normalized(mut self) -> Self {
        self.brand = self.brand.filter(|s| !s.trim().is_empty());
        self.model = self.model.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn matches(&self, r: &MarketData) -> bool {
        if self.brand.as_ref().is_some_and(|b| *b != r.brand) {
            return false;
        }
        if self.model.as_ref().is_some_and(|m| *m != r.model) {
            return false;
        }
        if self.year.is_some_and(|y| y != r.year) {
            return false;
        }
        if self.condition_score.is_some_and(|c| c != r.condition_score) {
            return false;
        }
        if let Some((lo, hi)) = self.mileage_bounds() {
            if r.mileage < lo || r.mileage > hi {
                return false;
            }
        }
        if let Some((lo, hi)) = self.sold_price_bounds() {
            if r.sold_price < lo || r.sold_price > hi {
                return false;
            }
        }
        true
    }
}

pub async fn search(
    repo: &dyn MarketRepo,
    filter: MarketFilter,
    page: Option<Page>,
) -> Result<Vec<MarketData>, RepoError> {
    let filter = filter.normalized();
    let rows = repo.search(&filter, page).await?;
    debug!(?filter, count = rows.len(), "market search");
    Ok(rows)
}

pub async fn get_by_id(repo: &dyn MarketRepo, id: Uuid) -> Result<Option<MarketData>, RepoError> {
    repo.get(id).await
}
