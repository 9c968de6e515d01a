//! In-memory stand-ins for the database and the prediction service.
//!
//! `MemoryStore` keeps the same constraints the schema enforces: unique
//! email, foreign keys on valuation inserts, and cascading deletes.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{
    jwt::JwtKeys,
    repo::UserRepo,
    repo_types::{NewUser, User},
};
use crate::config::{AppConfig, AuthMode, Environment, JwtConfig, PredictorConfig};
use crate::db::RepoError;
use crate::market::{
    repo::MarketRepo,
    repo_types::MarketData,
    services::{MarketFilter, Page},
};
use crate::prediction::{
    CarAttributes, ComparablesPredictor, Prediction, PredictionClient, PredictionError,
};
use crate::state::AppState;
use crate::valuations::{
    repo::{ValuationRepo, USER_FK},
    repo_types::{Comparable, NewValuation, Valuation, ValuationDetails},
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    market: Vec<MarketData>,
    valuations: Vec<Valuation>,
    // (link, rank)
    neighbors: Vec<(Comparable, usize)>,
}

impl Tables {
    fn drop_valuations_of(&mut self, user_id: Uuid) {
        let gone: Vec<Uuid> = self
            .valuations
            .iter()
            .filter(|v| v.user_id == user_id)
            .map(|v| v.id)
            .collect();
        self.valuations.retain(|v| v.user_id != user_id);
        self.neighbors.retain(|(c, _)| !gone.contains(&c.valuation_id));
    }

    fn links_of(&self, valuation_id: Uuid) -> Vec<Comparable> {
        let mut links: Vec<&(Comparable, usize)> = self
            .neighbors
            .iter()
            .filter(|(c, _)| c.valuation_id == valuation_id)
            .collect();
        links.sort_by_key(|(_, rank)| *rank);
        links.into_iter().map(|(c, _)| c.clone()).collect()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    lookups_down: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn add_user(&self, email: &str) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: email.split('@').next().unwrap_or(email).to_string(),
            password_hash: "not-a-real-hash".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        let id = user.id;
        self.lock().users.push(user);
        id
    }

    pub fn add_market(&self, record: MarketData) -> Uuid {
        let id = record.id;
        self.lock().market.push(record);
        id
    }

    /// Deletes a market record; comparables pointing at it go too.
    pub fn remove_market(&self, id: Uuid) {
        let mut t = self.lock();
        t.market.retain(|m| m.id != id);
        t.neighbors.retain(|(c, _)| c.market_data_id != id);
    }

    /// Makes every user lookup fail as if the database were unreachable.
    pub fn fail_user_lookups(&self) {
        self.lookups_down.store(true, Ordering::SeqCst);
    }

    fn user_lookup(&self) -> Result<(), RepoError> {
        if self.lookups_down.load(Ordering::SeqCst) {
            return Err(RepoError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn valuation_count(&self) -> usize {
        self.lock().valuations.len()
    }

    pub fn comparable_count(&self, valuation_id: Uuid) -> usize {
        self.lock()
            .neighbors
            .iter()
            .filter(|(c, _)| c.valuation_id == valuation_id)
            .count()
    }

    pub fn total_comparables(&self) -> usize {
        self.lock().neighbors.len()
    }
}

pub fn market_record(
    brand: &str,
    model: &str,
    year: i32,
    condition_score: i32,
    mileage: i32,
    sold_price: i64,
) -> MarketData {
    MarketData {
        id: Uuid::new_v4(),
        brand: brand.into(),
        model: model.into(),
        year,
        condition_score,
        mileage,
        sold_price: Decimal::new(sold_price * 100, 2),
        sold_date: OffsetDateTime::now_utc(),
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        let mut t = self.lock();
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::Conflict("users_email_key".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        self.user_lookup()?;
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        self.user_lookup()?;
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut t = self.lock();
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        let removed = t.users.len() != before;
        if removed {
            t.drop_valuations_of(id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl MarketRepo for MemoryStore {
    async fn search(&self, filter: &MarketFilter, page: Option<Page>) -> Result<Vec<MarketData>, RepoError> {
        let t = self.lock();
        let mut rows: Vec<MarketData> = t.market.iter().filter(|r| filter.matches(r)).cloned().collect();
        rows.sort_by(|a, b| b.sold_date.cmp(&a.sold_date).then_with(|| a.id.cmp(&b.id)));
        if let Some(page) = page {
            // Postgres refuses negative LIMIT/OFFSET
            let (Ok(offset), Ok(limit)) = (usize::try_from(page.offset), usize::try_from(page.limit)) else {
                return Err(RepoError::Database(sqlx::Error::Protocol(
                    "LIMIT and OFFSET must not be negative".into(),
                )));
            };
            rows = rows.into_iter().skip(offset).take(limit).collect();
        }
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<MarketData>, RepoError> {
        Ok(self.lock().market.iter().find(|r| r.id == id).cloned())
    }
}

#[async_trait]
impl ValuationRepo for MemoryStore {
    async fn insert(&self, v: &NewValuation, neighbors: &[Uuid]) -> Result<Valuation, RepoError> {
        let mut t = self.lock();
        if !t.users.iter().any(|u| u.id == v.user_id) {
            return Err(RepoError::MissingReference(USER_FK.into()));
        }
        if neighbors.iter().any(|n| !t.market.iter().any(|m| m.id == *n)) {
            return Err(RepoError::MissingReference(
                "valuation_neighbors_market_data_id_fkey".into(),
            ));
        }
        let valuation = v.to_valuation();
        t.valuations.push(valuation.clone());
        for (rank, market_data_id) in neighbors.iter().enumerate() {
            let link = Comparable {
                id: Uuid::new_v4(),
                valuation_id: v.id,
                market_data_id: *market_data_id,
                market_data: None,
            };
            t.neighbors.push((link, rank));
        }
        Ok(valuation)
    }

    async fn get_expanded(&self, id: Uuid) -> Result<Option<ValuationDetails>, RepoError> {
        let t = self.lock();
        let Some(valuation) = t.valuations.iter().find(|v| v.id == id).cloned() else {
            return Ok(None);
        };
        let valuation_neighbors = t
            .links_of(id)
            .into_iter()
            .map(|mut c| {
                c.market_data = t.market.iter().find(|m| m.id == c.market_data_id).cloned();
                c
            })
            .collect();
        Ok(Some(ValuationDetails {
            valuation,
            valuation_neighbors,
        }))
    }

    async fn history(&self, user_id: Uuid) -> Result<Vec<ValuationDetails>, RepoError> {
        let t = self.lock();
        let mut valuations: Vec<Valuation> = t
            .valuations
            .iter()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect();
        valuations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(valuations
            .into_iter()
            .map(|valuation| ValuationDetails {
                valuation_neighbors: t.links_of(valuation.id),
                valuation,
            })
            .collect())
    }
}

/// Predictor with a canned answer that counts how often it was asked.
pub struct StubPredictor {
    answer: Box<dyn Fn() -> Result<Prediction, PredictionError> + Send + Sync>,
    calls: AtomicUsize,
}

impl StubPredictor {
    pub fn returning(predicted_price: i32, neighbors: Vec<Uuid>) -> Self {
        Self {
            answer: Box::new(move || {
                Ok(Prediction {
                    predicted_price,
                    neighbors: neighbors.clone(),
                })
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: impl Fn() -> PredictionError + Send + Sync + 'static) -> Self {
        Self {
            answer: Box::new(move || Err(err())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PredictionClient for StubPredictor {
    async fn predict(&self, _car: &CarAttributes) -> Result<Prediction, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.answer)()
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        environment: Environment::Development,
        host: "127.0.0.1".into(),
        port: 0,
        database_url: "postgres://unused".into(),
        db_max_connections: 1,
        jwt: JwtConfig {
            mode: AuthMode::Local {
                secret: "test".into(),
            },
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        },
        predictor: PredictorConfig::Local { k: 3 },
    }
}

/// App state over one shared `MemoryStore`, predicting from its market rows.
pub fn fake_state() -> (AppState, Arc<MemoryStore>) {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let jwt = JwtKeys::from_config(&config.jwt).expect("test jwt keys");
    let market: Arc<dyn MarketRepo> = store.clone();
    let state = AppState {
        jwt: Arc::new(jwt),
        users: store.clone(),
        valuations: store.clone(),
        predictor: Arc::new(ComparablesPredictor::new(market.clone(), 3)),
        market,
        config: Arc::new(config),
    };
    (state, store)
}

/// `Authorization` header value for `user_id`.
pub fn bearer(state: &AppState, user_id: Uuid) -> String {
    let token = state.jwt.sign_access(user_id).expect("sign test token");
    format!("Bearer {token}")
}
