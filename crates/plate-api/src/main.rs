//! Plate API Server
//!
//! REST API server for the outlet management platform.

use anyhow::Context;
use plate_api::auth::revocation::{MemoryRevocationStore, RedisRevocationStore, RevocationStore};
use plate_api::{account::PgAccountRepository, create_router, state::AppState};
use plate_core::config::{AppConfig, CacheBackend, LoggingConfig};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);
    config.validate().context("invalid configuration")?;

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        cache_backend = ?config.cache.backend,
        revocation_fail_mode = ?config.auth.revocation_fail_mode,
        "Configuration loaded"
    );

    // PostgreSQL
    let pool = PgPoolOptions::new()
        .max_connections(config.database.pool_size)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.postgres_url)
        .await
        .context("connecting to PostgreSQL")?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("running database migrations")?;
        tracing::info!("Database migrations applied");
    }

    // Revocation cache
    let revocations: Arc<dyn RevocationStore> = match config.cache.backend {
        CacheBackend::Redis => Arc::new(
            RedisRevocationStore::connect(&config.cache.redis_url)
                .await
                .context("connecting to Redis")?,
        ),
        CacheBackend::Memory => {
            tracing::warn!("Using in-process revocation cache; logouts are not shared across instances");
            Arc::new(MemoryRevocationStore::new(config.cache.memory_max_capacity))
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);

    let state = Arc::new(AppState::new(
        config,
        Arc::new(PgAccountRepository::new(pool.clone())),
        revocations,
    )?);
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Plate API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    let shutdown_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_state.set_ready(false);
        })
        .await?;

    if tokio::time::timeout(shutdown_timeout, pool.close()).await.is_err() {
        tracing::warn!("Timed out closing database pool");
    }
    tracing::info!("Server stopped");

    Ok(())
}

/// `PLATE_CONFIG` points at a TOML file; environment variables override it
fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("PLATE_CONFIG") {
        Ok(path) => AppConfig::from_file(&path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
