use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::env;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sakan_backend::config::{AppConfig, ENV_DATABASE_URL};
use sakan_backend::handlers::routes::build_router;
use sakan_backend::services::gateway::StripeGateway;
use sakan_backend::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sakan_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    if config.gateway_secret_key.is_empty() {
        tracing::warn!("GATEWAY_SECRET_KEY not set; card payments will fail");
    }
    if config.gateway_webhook_secret.is_empty() {
        tracing::warn!("GATEWAY_WEBHOOK_SECRET not set; webhooks will be refused");
    }
    if config.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY not set; reviewer endpoints are disabled");
    }

    // Connect to database
    let database_url = env::var(ENV_DATABASE_URL).map_err(|_| {
        tracing::error!("{} must be set", ENV_DATABASE_URL);
        format!("{} must be set", ENV_DATABASE_URL)
    })?;
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;

    let gateway = StripeGateway::from_config(&config);
    let bind_addr = config.bind_addr.clone();

    let state = AppState {
        db,
        gateway: Arc::new(gateway),
        config: Arc::new(config),
    };

    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
