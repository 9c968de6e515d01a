use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

/// How bearer tokens are verified.
#[derive(Debug, Clone, Deserialize)]
pub enum AuthMode {
    /// HS256 tokens signed and verified by this service.
    Local { secret: String },
    /// RS256 tokens issued by a hosted identity provider.
    External { public_key_pem: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub mode: AuthMode,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub enum PredictorConfig {
    /// In-process comparables search over the market table.
    Local { k: usize },
    /// Hosted nearest-neighbor model reached over HTTP.
    Http { url: String, timeout_secs: u64 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub predictor: PredictorConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = match env_or("APP_ENV", "development").as_str() {
            "development" | "dev" => Environment::Development,
            "production" | "prod" => Environment::Production,
            other => bail!("unknown APP_ENV {other:?}"),
        };

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;

        let mode = match env_or("AUTH_MODE", "local").as_str() {
            "local" => AuthMode::Local {
                secret: std::env::var("JWT_SECRET").context("JWT_SECRET is required")?,
            },
            "external" => AuthMode::External {
                public_key_pem: std::env::var("JWT_PUBLIC_KEY")
                    .context("JWT_PUBLIC_KEY is required when AUTH_MODE=external")?,
            },
            other => bail!("unknown AUTH_MODE {other:?}"),
        };
        let jwt = JwtConfig {
            mode,
            issuer: env_or("JWT_ISSUER", "carvalue"),
            audience: env_or("JWT_AUDIENCE", "carvalue-users"),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };

        let predictor = match env_or("PREDICTOR", "local").as_str() {
            "local" => PredictorConfig::Local {
                k: env_parse("PREDICTOR_K", 5),
            },
            "http" => PredictorConfig::Http {
                url: std::env::var("PREDICTOR_URL")
                    .context("PREDICTOR_URL is required when PREDICTOR=http")?,
                timeout_secs: env_parse("PREDICTOR_TIMEOUT_SECS", 10),
            },
            other => bail!("unknown PREDICTOR {other:?}"),
        };

        Ok(Self {
            environment,
            host: env_or("APP_HOST", "0.0.0.0"),
            port: env_parse("APP_PORT", 8080),
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            jwt,
            predictor,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
