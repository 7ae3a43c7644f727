use super::ports::VectorStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub struct CollectionManager {
    store: Arc<dyn VectorStore>,
}

impl CollectionManager {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        CollectionManager { store }
    }

    /// Creates the photo collection unless it is already present. Safe to
    /// call on every run.
    pub async fn ensure_exists(&self) -> Result<()> {
        if self
            .store
            .collection_exists()
            .await
            .context("collection setup failed")?
        {
            debug!("Photo collection already exists, nothing to do");
            return Ok(());
        }

        self.store
            .create_collection()
            .await
            .context("collection setup failed")?;
        info!("Created the photo collection");
        Ok(())
    }
}
