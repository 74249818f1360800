use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use courtlog::config::AppConfig;
use courtlog::database::connection::get_db_client;
use courtlog::database::mongo::MongoStore;
use courtlog::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;

    let db = get_db_client(&config).await.context("connecting to MongoDB")?;
    let store = MongoStore::new(db);
    store.ensure_indexes().await.context("creating indexes")?;

    let (state, worker) = AppState::new(Arc::new(store), config.cascade);
    worker.spawn();
    tracing::info!("✅ Cascade worker started");

    let app = courtlog::build_router(state);
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!("🚀 Server starting on {}", addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
