// src/main.rs
use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use sjf_stock_ledger::{
    config::AppConfig, database, routes, state::AppState, store::PgInventoryStore,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return;
        }
    };

    // Create database pool
    let db_pool = match database::create_pool(
        &config.database_url,
        config.database_max_connections,
    )
    .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create database pool");
            return;
        }
    };
    if let Err(e) = database::run_migrations(&db_pool).await {
        tracing::error!(error = %e, "Failed to run migrations");
        return;
    }

    // Create application state
    let store = Arc::new(PgInventoryStore::new(db_pool));
    let app_state = AppState::new(store, config.jwt_secret.as_str());

    let app = routes::create_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Try PORT..PORT+20 to avoid crash when address is in use
    let listener = {
        let mut bound = None;
        for offset in 0u16..=20 {
            let port = config.port.saturating_add(offset);
            let addr = SocketAddr::from((config.host, port));
            match TcpListener::bind(addr).await {
                Ok(l) => {
                    bound = Some((l, addr));
                    break;
                }
                Err(e) => {
                    if offset == 0 {
                        tracing::warn!(%addr, error = %e, "Port in use, trying next");
                    }
                }
            }
        }
        match bound {
            Some((l, addr)) => {
                tracing::info!("Server running on {}", addr);
                l
            }
            None => {
                tracing::error!(
                    "Failed to bind to any port starting at {} on {}",
                    config.port,
                    config.host
                );
                return;
            }
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
    }
}
