use std::env;

use anyhow::{anyhow, Context, Result};
use common_auth::JwtConfig;

const DEFAULT_JWT_EXPIRATION_MS: i64 = 86_400_000;
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub run_migrations: bool,
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub admin_bootstrap: Option<AdminBootstrap>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET")
            .and_then(|v| normalize_optional(&v))
            .context("JWT_SECRET must be set")?;
        let ttl_ms = match lookup("JWT_EXPIRATION_MS").and_then(|v| normalize_optional(&v)) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|err| anyhow!("Invalid JWT_EXPIRATION_MS '{raw}': {err}"))?,
            None => DEFAULT_JWT_EXPIRATION_MS,
        };
        let jwt = JwtConfig::new(secret).with_ttl_millis(ttl_ms);
        jwt.validate()?;

        let store_backend = match lookup("STORE_BACKEND").and_then(|v| normalize_optional(&v)) {
            None => StoreBackend::Postgres,
            Some(raw) => parse_backend(&raw)?,
        };
        let database_url = lookup("DATABASE_URL").and_then(|v| normalize_optional(&v));
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL must be set when STORE_BACKEND=postgres"));
        }
        let run_migrations = bool_from(lookup("RUN_MIGRATIONS")).unwrap_or(true);

        let host = lookup("HOST")
            .and_then(|v| normalize_optional(&v))
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match lookup("PORT").and_then(|v| normalize_optional(&v)) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|err| anyhow!("Invalid PORT '{raw}': {err}"))?,
            None => DEFAULT_PORT,
        };
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|v| parse_list(&v))
            .unwrap_or_default();

        let admin_bootstrap = match (
            lookup("ADMIN_BOOTSTRAP_EMAIL").and_then(|v| normalize_optional(&v)),
            lookup("ADMIN_BOOTSTRAP_PASSWORD").and_then(|v| normalize_optional(&v)),
        ) {
            (Some(email), Some(password)) => Some(AdminBootstrap { email, password }),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "ADMIN_BOOTSTRAP_EMAIL and ADMIN_BOOTSTRAP_PASSWORD must be set together"
                ))
            }
        };

        Ok(AppConfig {
            jwt,
            store_backend,
            database_url,
            run_migrations,
            host,
            port,
            cors_allowed_origins,
            admin_bootstrap,
        })
    }
}

fn parse_backend(value: &str) -> Result<StoreBackend> {
    match value.trim().to_ascii_lowercase().as_str() {
        "postgres" | "pg" => Ok(StoreBackend::Postgres),
        "memory" | "mem" => Ok(StoreBackend::Memory),
        other => Err(anyhow!("Unsupported STORE_BACKEND '{other}'. Use postgres or memory.")),
    }
}

fn bool_from(value: Option<String>) -> Option<bool> {
    value.map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(normalize_optional)
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
