use roomchat::{
    auth::repository::PostgresAccountRepository,
    db,
    message::repository::PostgresMessageRepository,
    room::repository::PostgresRoomRepository,
    AppState, ServerConfig,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomchat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting room chat server");

    let config = ServerConfig::from_env();

    // In-memory repositories unless DATABASE_URL is set
    let app_state = match config.database_url.clone() {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(&database_url)
                .await?;
            db::ensure_schema(&pool).await?;
            info!("Using PostgreSQL repositories");

            AppState::new(
                config.clone(),
                Arc::new(PostgresAccountRepository::new(pool.clone())),
                Arc::new(PostgresRoomRepository::new(pool.clone())),
                Arc::new(PostgresMessageRepository::new(pool)),
            )
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory repositories");
            AppState::in_memory(config.clone())
        }
    };

    let registry = Arc::clone(&app_state.registry);
    let app = roomchat::app(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(bind_addr = %config.bind_addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            // Live sessions hold their upgraded connections open; close them first
            let closed = registry.shutdown().await;
            info!(closed_connections = closed, "Shutting down");
        })
        .await?;

    Ok(())
}
