use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;
    Ok(db)
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    Ok(())
}

/// Storage failures, with the constraint violations callers act on split out.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// A unique constraint rejected the write.
    #[error("duplicate value violates {0}")]
    Conflict(String),
    /// A foreign key pointed at a row that does not exist.
    #[error("missing referenced row for {0}")]
    MissingReference(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or("constraint").to_string();
            if db_err.is_unique_violation() {
                return RepoError::Conflict(constraint);
            }
            if db_err.is_foreign_key_violation() {
                return RepoError::MissingReference(constraint);
            }
        }
        RepoError::Database(err)
    }
}
