use std::{sync::Arc, time::Duration};

use sqlx::PgPool;

use crate::auth::{jwt::JwtKeys, repo::PgUserRepo, repo::UserRepo};
use crate::config::{AppConfig, PredictorConfig};
use crate::market::repo::{MarketRepo, PgMarketRepo};
use crate::prediction::{ComparablesPredictor, HttpPredictionClient, PredictionClient};
use crate::valuations::repo::{PgValuationRepo, ValuationRepo};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtKeys>,
    pub users: Arc<dyn UserRepo>,
    pub market: Arc<dyn MarketRepo>,
    pub valuations: Arc<dyn ValuationRepo>,
    pub predictor: Arc<dyn PredictionClient>,
}

impl AppState {
    pub fn from_pool(config: AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let jwt = Arc::new(JwtKeys::from_config(&config.jwt)?);

        let market = Arc::new(PgMarketRepo::new(db.clone())) as Arc<dyn MarketRepo>;

        let predictor = match &config.predictor {
            PredictorConfig::Local { k } => {
                tracing::warn!(k, "using in-process comparables predictor");
                Arc::new(ComparablesPredictor::new(market.clone(), *k)) as Arc<dyn PredictionClient>
            }
            PredictorConfig::Http { url, timeout_secs } => Arc::new(HttpPredictionClient::new(
                url.clone(),
                Duration::from_secs(*timeout_secs),
            )?) as Arc<dyn PredictionClient>,
        };

        Ok(Self {
            config,
            jwt,
            users: Arc::new(PgUserRepo::new(db.clone())),
            market,
            valuations: Arc::new(PgValuationRepo::new(db)),
            predictor,
        })
    }
}
