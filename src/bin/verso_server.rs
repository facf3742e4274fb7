use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderName, HeaderValue, Method, header};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;
use verso_backend::api::{self, HasPool, VersoApp};
use verso_backend::auth::USER_ID_HEADER;
use verso_backend::config::ServerConfig;
use verso_backend::db;

#[derive(Clone)]
struct ServerApp {
    pool: Arc<PgPool>,
}

impl HasPool for ServerApp {
    fn pool(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }
}

impl VersoApp for ServerApp {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to postgres")?;
    tracing::info!("Connected to postgres");

    if config.run_migrations {
        db::create_verso_tables(&pool)
            .await
            .context("failed to run verso migrations")?;
    }

    let cors = cors_layer(&config.frontend_url)?;
    let app_state = ServerApp {
        pool: Arc::new(pool.clone()),
    };
    let app = api::router(app_state).layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.bind_addr))?;
    tracing::info!("verso server listening on http://{}/api", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("verso server failed")?;

    pool.close().await;
    tracing::info!("verso server stopped");
    Ok(())
}

fn cors_layer(frontend_url: &str) -> anyhow::Result<CorsLayer> {
    let origin = HeaderValue::from_str(frontend_url)
        .with_context(|| format!("invalid FRONTEND_URL '{}'", frontend_url))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(USER_ID_HEADER),
        ]))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
