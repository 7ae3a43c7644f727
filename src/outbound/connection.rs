use super::auth::CredentialManager;
use super::weaviate::WeaviateClient;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::env::var;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

// The backend token is short-lived; rebuilding the handle on this interval
// keeps its headers fresh without touching a live client.
const REBUILD_INTERVAL: Duration = Duration::from_secs(60 * 60);

const VERTEX_TOKEN_HEADER: &str = "X-Goog-Vertex-Api-Key";
const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_LOCATION: &str = "us-central1";

#[derive(Debug, Clone)]
pub struct WeaviateConfig {
    pub base_url: String,
    pub api_key: String,
    pub project_id: String,
    pub location: String,
}

impl WeaviateConfig {
    pub fn from_env() -> Result<Self> {
        // load env from .env file
        dotenv::dotenv().ok();

        Ok(WeaviateConfig {
            base_url: var("WEAVIATE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            api_key: var("WEAVIATE_API_KEY").context("WEAVIATE_API_KEY is not set")?,
            project_id: var("GOOGLE_PROJECT_ID").context("GOOGLE_PROJECT_ID is not set")?,
            location: var("GOOGLE_LOCATION").unwrap_or_else(|_| DEFAULT_LOCATION.into()),
        })
    }
}

/// Owns the handle to the vector store. The handle carries the static API
/// key and the current bearer token as default headers, so it is rebuilt
/// once the rebuild interval has passed rather than mutated in place.
pub struct ConnectionProvider {
    config: WeaviateConfig,
    credentials: Arc<CredentialManager>,
    rebuild_interval: Duration,
    state: Mutex<Option<(Arc<WeaviateClient>, Instant)>>,
}

impl ConnectionProvider {
    pub fn new(config: WeaviateConfig, credentials: Arc<CredentialManager>) -> Self {
        Self::with_rebuild_interval(config, credentials, REBUILD_INTERVAL)
    }

    pub fn with_rebuild_interval(
        config: WeaviateConfig,
        credentials: Arc<CredentialManager>,
        rebuild_interval: Duration,
    ) -> Self {
        ConnectionProvider {
            config,
            credentials,
            rebuild_interval,
            state: Mutex::new(None),
        }
    }

    /// Returns the cached handle, building a new one when none exists or the
    /// rebuild interval has elapsed since the last build.
    pub async fn get_client(&self) -> Result<Arc<WeaviateClient>> {
        let mut state = self.state.lock().await;

        if let Some((client, built_at)) = state.as_ref() {
            if built_at.elapsed() <= self.rebuild_interval {
                return Ok(Arc::clone(client));
            }
            debug!(
                "Connection handle is older than {:?}, rebuilding",
                self.rebuild_interval
            );
        }

        let client = Arc::new(
            self.build_client()
                .await
                .context("vector store connection failed")?,
        );
        *state = Some((Arc::clone(&client), Instant::now()));
        Ok(client)
    }

    /// Drops the held handle. Safe to call when none exists.
    pub async fn close_client(&self) {
        let mut state = self.state.lock().await;
        if state.take().is_some() {
            info!("Released the vector store connection handle");
        }
    }

    async fn build_client(&self) -> Result<WeaviateClient> {
        let token = self.credentials.get_valid_token().await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))?,
        );
        headers.insert(VERTEX_TOKEN_HEADER, HeaderValue::from_str(&token)?);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(WeaviateClient::new(http, &self.config))
    }
}
