use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use admin_service::config::{AppConfig, StoreBackend};
use admin_service::identity::ensure_admin;
use admin_service::store::postgres::PgStore;
use admin_service::store::Stores;
use admin_service::{build_router, AppState};
use anyhow::{anyhow, Context};
use common_auth::TokenService;
use common_observability::AdminMetrics;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;

    let stores = match config.store_backend {
        StoreBackend::Memory => {
            info!("using in-memory store");
            Stores::memory()
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;
            let store = PgStore::connect(url).await?;
            if config.run_migrations {
                store.migrate().await?;
                info!("database migrations applied");
            }
            Stores::postgres(store)
        }
    };

    if let Some(bootstrap) = &config.admin_bootstrap {
        let admin = ensure_admin(stores.customers.as_ref(), &bootstrap.email, &bootstrap.password)
            .await
            .map_err(|err| anyhow!("admin bootstrap failed: {err}"))?;
        info!(customer_id = ?admin.id, "admin account ready");
    }

    let tokens = Arc::new(TokenService::new(config.jwt.clone())?);
    let metrics = Arc::new(AdminMetrics::new()?);
    let state = AppState::new(stores, tokens, metrics);
    let app = build_router(state, &config.cors_allowed_origins);

    let ip: IpAddr = config.host.parse().context("HOST must be an IP address")?;
    let addr = SocketAddr::from((ip, config.port));
    info!(%addr, "starting admin-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
