use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use integral_leads_api::config::Config;
use integral_leads_api::handlers::AppState;
use integral_leads_api::routes::{build_router, RateLimit};
use integral_leads_api::storage::LeadStore;
use integral_leads_api::table_client::{AzureTableClient, StorageConnection};

/// Builds the table store from the configured connection string.
///
/// A missing or unusable connection string leaves the store unset; the
/// service still starts and reports the problem through the status endpoint.
fn build_store(config: &Config) -> Option<Arc<dyn LeadStore>> {
    let connection_string = config.storage_connection_string.as_deref()?;

    let client = StorageConnection::parse(connection_string)
        .and_then(|connection| AzureTableClient::new(connection, config.table_name.clone()));

    match client {
        Ok(client) => {
            tracing::info!("✓ Table client initialized for table '{}'", client.table_name());
            let store: Arc<dyn LeadStore> = Arc::new(client);
            Some(store)
        }
        Err(e) => {
            tracing::error!("Failed to initialize table client: {}", e);
            None
        }
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "integral_leads_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let app_state = Arc::new(AppState {
        store: build_store(&config),
        has_connection_string: config.storage_connection_string.is_some(),
        environment: config.environment.clone(),
    });

    let app = build_router(
        app_state,
        Some(RateLimit {
            per_second: config.rate_limit_per_second,
            burst: config.rate_limit_burst,
        }),
    )?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
