use super::models::{Coordinates, Credential, GeoFilter, ImageRecord, SearchResult, StoredImage};
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// One round of the external authentication exchange for the embedding
/// backend. Implementations are swappable strategies (service account key,
/// CLI delegation); caching and expiry live in the credential manager.
#[async_trait]
pub trait TokenExchange: 'static + Send + Sync {
    async fn exchange(&self) -> Result<Credential>;
}

#[async_trait]
pub trait VectorStore: 'static + Send + Sync {
    async fn collection_exists(&self) -> Result<bool>;

    async fn create_collection(&self) -> Result<()>;

    async fn delete_collection(&self) -> Result<()>;

    async fn insert(&self, image: &StoredImage) -> Result<()>;

    /// Existence check on the stored-object identity field.
    async fn exists_by_url(&self, url: &str) -> Result<bool>;

    async fn query_near_text(
        &self,
        text: &str,
        limit: usize,
        filter: Option<&GeoFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Bounded, unranked listing of stored objects.
    async fn fetch_all(&self, limit: usize) -> Result<Vec<SearchResult>>;
}

#[async_trait]
pub trait Geocoder: 'static + Send + Sync {
    /// Resolves a place name to its single best coordinate match, or `None`
    /// when the place is unknown.
    async fn geocode(&self, place: &str) -> Result<Option<Coordinates>>;
}

pub trait ImageSource: 'static + Send + Sync {
    fn read_images(&self, root: &Path) -> Result<Vec<ImageRecord>>;
}
