//! Movies HAL server: ensures the database, applies the catalog, serves the API.

use movies_data_rest::{
    app, apply_migrations, connect, ensure_database_exists, resolve, AppState, FullConfig,
    ServerConfig,
};
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "movies_data_rest=info,movies_server=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    ensure_database_exists(&config.database_url).await?;
    let pool = connect(&config).await?;

    let catalog = match &config.catalog_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "loading catalog");
            FullConfig::from_dir(dir).await?
        }
        None => FullConfig::builtin()?,
    };
    apply_migrations(&pool, &catalog).await?;
    let model = resolve(&catalog)?;
    tracing::info!(entities = model.entities.len(), "catalog resolved");

    let state = AppState::new(pool.clone(), model, config.api_base_path.clone());
    let router = app(state, &config)?;

    let listener = TcpListener::bind(config.bind_address()).await?;
    tracing::info!(addr = %listener.local_addr()?, base_path = %config.api_base_path, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
