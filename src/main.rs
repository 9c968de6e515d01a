mod app;
mod auth;
mod config;
mod db;
mod error;
mod market;
mod prediction;
mod state;
#[cfg(test)]
mod testing;
mod valuations;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "carvalue=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    tracing::info!(environment = ?config.environment, "starting carvalue");

    let db = db::connect(&config).await?;
    db::migrate(&db).await?;

    let state = AppState::from_pool(config, db)?;
    let config = state.config.clone();
    let app = app::build_app(state);

    app::serve(app, &config).await
}
