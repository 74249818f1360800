use mongodb::{Client, Database};

use crate::config::AppConfig;
use crate::errors::Result;

pub async fn get_db_client(config: &AppConfig) -> Result<Database> {
    let client = Client::with_uri_str(&config.database_url).await?;
    let db = client.database(&config.database_name);

    // Verify database is reachable by listing collections
    match db.list_collection_names().await {
        Ok(collections) => {
            tracing::info!("✅ Connected to database: {}", config.database_name);
            tracing::info!("📂 Collections found: {:?}", collections);

            for expected in ["clubs", "players", "games"] {
                if !collections.iter().any(|name| name == expected) {
                    tracing::warn!("⚠️ '{}' collection not found, it will be created on first write", expected);
                }
            }
        }
        Err(e) => {
            tracing::error!("❌ Database '{}' may not exist or is inaccessible: {}", config.database_name, e);
            return Err(e.into());
        }
    }

    Ok(db)
}
