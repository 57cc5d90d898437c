//! Service registry API server.

use portal_api::config::Config;
use portal_api::server::{self, AppState};
use portal_registry::{Registry, SimulatedProbe};
use portal_store::SqliteRegistryStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let store = SqliteRegistryStore::new(&config.db_path)?;
    let registry = Registry::new(Arc::new(store), Arc::new(SimulatedProbe::new()));
    let state = Arc::new(AppState {
        registry,
        admin_token: config.admin_token.clone(),
    });

    let app = server::router(state);
    let addr: SocketAddr = config.listen.parse()?;
    tracing::info!(db = %config.db_path, "registry API listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}
