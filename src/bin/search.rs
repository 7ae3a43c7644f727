use anyhow::{anyhow, Result};
use photo_archive_rust::domain::ports::VectorStore;
use photo_archive_rust::domain::query::QueryService;
use photo_archive_rust::outbound::auth::{token_exchange_from_env, CredentialManager};
use photo_archive_rust::outbound::connection::{ConnectionProvider, WeaviateConfig};
use photo_archive_rust::outbound::geocode::NominatimGeocoder;
use photo_archive_rust::outbound::weaviate::WeaviateStore;
use std::sync::Arc;

const DEFAULT_LIMIT: usize = 5;
const LIST_ALL_LIMIT: usize = 100;

struct SearchArgs {
    query: String,
    limit: usize,
    location: Option<String>,
    radius_km: Option<f64>,
    list_all: bool,
}

/// Main entry point.
#[tokio::main]
async fn main() -> Result<()> {
    // Set up tracing for logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_target(false)
        .without_time()
        .init();

    let args = parse_args()?;

    let credentials = Arc::new(CredentialManager::new(token_exchange_from_env()?));
    let provider = Arc::new(ConnectionProvider::new(
        WeaviateConfig::from_env()?,
        credentials,
    ));
    let store: Arc<dyn VectorStore> = Arc::new(WeaviateStore::new(Arc::clone(&provider)));
    let service = QueryService::new(store, Arc::new(NominatimGeocoder::new()));

    let results = if args.list_all {
        service.list_all(LIST_ALL_LIMIT).await?
    } else {
        service
            .search(
                &args.query,
                args.limit,
                args.location.as_deref(),
                args.radius_km,
            )
            .await?
    };

    if results.is_empty() {
        println!("No photos found.");
    }
    for (index, result) in results.iter().enumerate() {
        println!(
            "{}. {}{} ({})",
            index + 1,
            result.title,
            result.extension,
            result.url
        );
        if let Some(coordinates) = &result.coordinates {
            println!("   GPS: {}, {}", coordinates.latitude, coordinates.longitude);
        }
        if let Some(score) = result.score {
            println!("   Similarity: {:.3}", score);
        }
    }

    provider.close_client().await;
    Ok(())
}

fn parse_args() -> Result<SearchArgs> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut query_words: Vec<String> = Vec::new();
    let mut limit = DEFAULT_LIMIT;
    let mut location = None;
    let mut radius_km = None;
    let mut list_all = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--all" => list_all = true,
            "--limit" => {
                limit = iter
                    .next()
                    .ok_or_else(|| anyhow!("--limit requires a value"))?
                    .parse()?;
            }
            "--location" => {
                location = Some(
                    iter.next()
                        .ok_or_else(|| anyhow!("--location requires a value"))?
                        .clone(),
                );
            }
            "--radius-km" => {
                radius_km = Some(
                    iter.next()
                        .ok_or_else(|| anyhow!("--radius-km requires a value"))?
                        .parse()?,
                );
            }
            word => query_words.push(word.to_string()),
        }
    }

    if !list_all && query_words.is_empty() {
        return Err(anyhow!("Please provide a search query or --all."));
    }

    Ok(SearchArgs {
        query: query_words.join(" "),
        limit,
        location,
        radius_km,
        list_all,
    })
}
