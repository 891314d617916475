use std::net::SocketAddr;
use std::sync::Arc;

use mimalloc::MiMalloc;
use pulsedesk::config::AppConfig;
use pulsedesk::services::postgres::PgDataService;
use pulsedesk::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// M-MIMALLOC-APP: Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulsedesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration");

    let pool =
        pulsedesk::db::create_pool(&config.database_url, config.database_max_connections).await?;
    pulsedesk::db::run_migrations(&pool).await?;
    let service = Arc::new(PgDataService::new(pool, config.change_channel.clone()));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppState::new(config, service);

    state.dashboard.activate().await?;

    let app = pulsedesk::routes::router(state.clone());

    tracing::info!(host = %addr, "Starting pulsedesk admin server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.dashboard.deactivate();
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
