use anyhow::{anyhow, Result};
use photo_archive_rust::domain::collection::CollectionManager;
use photo_archive_rust::domain::ingestion::IngestionPipeline;
use photo_archive_rust::domain::ports::{ImageSource, VectorStore};
use photo_archive_rust::outbound::auth::{token_exchange_from_env, CredentialManager};
use photo_archive_rust::outbound::connection::{ConnectionProvider, WeaviateConfig};
use photo_archive_rust::outbound::files::FileSystemImageSource;
use photo_archive_rust::outbound::weaviate::WeaviateStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_PHOTO_BASE_URL: &str = "https://photos.example.com/";

/// Main entry point.
#[tokio::main]
async fn main() -> Result<()> {
    // Set up tracing for logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let (root_path, batch_size, skip_existing) = parse_args()?;

    let credentials = Arc::new(CredentialManager::new(token_exchange_from_env()?));
    let provider = Arc::new(ConnectionProvider::new(
        WeaviateConfig::from_env()?,
        credentials,
    ));
    let store: Arc<dyn VectorStore> = Arc::new(WeaviateStore::new(Arc::clone(&provider)));

    // Release the connection handle on Ctrl-C.
    let shutdown_provider = Arc::clone(&provider);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_provider.close_client().await;
            std::process::exit(130);
        }
    });

    CollectionManager::new(Arc::clone(&store))
        .ensure_exists()
        .await?;

    let records = FileSystemImageSource::new().read_images(&root_path)?;
    info!(
        "Found {} image(s) under {}",
        records.len(),
        root_path.display()
    );

    let base_url =
        std::env::var("PHOTO_BASE_URL").unwrap_or_else(|_| DEFAULT_PHOTO_BASE_URL.into());
    let pipeline = IngestionPipeline::new(store, base_url);
    let report = pipeline.ingest(&records, batch_size, skip_existing).await?;

    info!("{}", report);
    for failure in &report.failures {
        warn!("Failed: {}", failure);
    }

    provider.close_client().await;
    Ok(())
}

fn parse_args() -> Result<(PathBuf, usize, bool)> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut root_path = None;
    let mut batch_size = DEFAULT_BATCH_SIZE;
    let mut skip_existing = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--batch-size" => {
                batch_size = iter
                    .next()
                    .ok_or_else(|| anyhow!("--batch-size requires a value"))?
                    .parse()?;
                if batch_size == 0 {
                    return Err(anyhow!("--batch-size must be positive"));
                }
            }
            "--skip-existing" => skip_existing = true,
            path if root_path.is_none() => root_path = Some(PathBuf::from(path)),
            other => return Err(anyhow!("Unexpected argument: {}", other)),
        }
    }

    let root_path = root_path.ok_or_else(|| anyhow!("Please provide a path to the folder."))?;
    Ok((root_path, batch_size, skip_existing))
}
