use super::models::{GeoFilter, SearchResult};
use super::ports::{Geocoder, VectorStore};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

// Radius applied when a location is given without an explicit one.
pub const DEFAULT_RADIUS_KM: f64 = 25.0;

pub struct QueryService {
    store: Arc<dyn VectorStore>,
    geocoder: Arc<dyn Geocoder>,
}

impl QueryService {
    pub fn new(store: Arc<dyn VectorStore>, geocoder: Arc<dyn Geocoder>) -> Self {
        QueryService { store, geocoder }
    }

    /// Runs a similarity search for `query`. When `location` resolves to a
    /// coordinate pair the query is constrained to `radius_km` around it; a
    /// geocoding miss only drops the constraint, never the search. Results
    /// come back in backend ranking order.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        location: Option<&str>,
        radius_km: Option<f64>,
    ) -> Result<Vec<SearchResult>> {
        let filter = match location {
            Some(place) => self.resolve_location(place, radius_km).await,
            None => None,
        };

        self.store.query_near_text(query, limit, filter.as_ref()).await
    }

    /// Plain bounded listing of the stored photos, no ranking.
    pub async fn list_all(&self, limit: usize) -> Result<Vec<SearchResult>> {
        self.store.fetch_all(limit).await
    }

    async fn resolve_location(&self, place: &str, radius_km: Option<f64>) -> Option<GeoFilter> {
        match self.geocoder.geocode(place).await {
            Ok(Some(coordinates)) => {
                let filter = GeoFilter {
                    latitude: coordinates.latitude,
                    longitude: coordinates.longitude,
                    radius_km: radius_km.unwrap_or(DEFAULT_RADIUS_KM),
                };
                debug!(
                    "Resolved \"{}\" to ({}, {}), filtering within {} km",
                    place, filter.latitude, filter.longitude, filter.radius_km
                );
                Some(filter)
            }
            Ok(None) => {
                warn!(
                    "No geocoding match for \"{}\", searching without a location filter",
                    place
                );
                None
            }
            Err(e) => {
                warn!(
                    "Geocoding \"{}\" failed ({}), searching without a location filter",
                    place, e
                );
                None
            }
        }
    }
}
