use anyhow::{anyhow, Result};
use photo_archive_rust::domain::collection::CollectionManager;
use photo_archive_rust::domain::ports::VectorStore;
use photo_archive_rust::outbound::auth::{token_exchange_from_env, CredentialManager};
use photo_archive_rust::outbound::connection::{ConnectionProvider, WeaviateConfig};
use photo_archive_rust::outbound::weaviate::WeaviateStore;
use std::sync::Arc;
use tracing::info;

/// Main entry point.
#[tokio::main]
async fn main() -> Result<()> {
    // Set up tracing for logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        return Err(anyhow!("Usage: collection <create|delete>"));
    }

    let credentials = Arc::new(CredentialManager::new(token_exchange_from_env()?));
    let provider = Arc::new(ConnectionProvider::new(
        WeaviateConfig::from_env()?,
        credentials,
    ));
    let store: Arc<dyn VectorStore> = Arc::new(WeaviateStore::new(Arc::clone(&provider)));

    match args[1].as_str() {
        "create" => {
            CollectionManager::new(Arc::clone(&store))
                .ensure_exists()
                .await?;
        }
        "delete" => {
            store.delete_collection().await?;
            info!("Deleted the photo collection");
        }
        other => return Err(anyhow!("Unknown command: {}", other)),
    }

    provider.close_client().await;
    Ok(())
}
