use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use happy_crm::config::AppConfig;
use happy_crm::database::DatabaseManager;
use happy_crm::server;
use happy_crm::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, TWILIO_*, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("happy_crm=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env();
    tracing::info!("Starting Happy CRM API in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        tracing::warn!("SUPABASE_JWT_SECRET is not set; protected routes will answer 503");
    }

    let db = DatabaseManager::connect_lazy(&config.database).context("failed to configure database pool")?;
    let port = config.server.port;
    let sweep_every = Duration::from_secs(config.events.sweep_interval_secs.max(1));

    let state = AppState::new(config, db.clone());
    let sweeper = state.spawn_sweeper(sweep_every);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Happy CRM API listening on http://{}", bind_addr);

    axum::serve(listener, server::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.abort();
    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
