use crate::domain::models::Coordinates;
use crate::domain::ports::Geocoder;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use std::env::var;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
// Nominatim rejects requests without an identifying agent.
const USER_AGENT_VALUE: &str = "photo-archive-rust";

pub struct NominatimGeocoder {
    http: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new() -> Self {
        // load env from .env file
        dotenv::dotenv().ok();
        let base_url = var("NOMINATIM_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        NominatimGeocoder {
            http: reqwest::Client::new(),
            base_url,
        }
    }
}

impl Default for NominatimGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, place: &str) -> Result<Option<Coordinates>> {
        let places: Vec<NominatimPlace> = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("q", place), ("format", "json"), ("limit", "1")])
            .header(USER_AGENT, USER_AGENT_VALUE)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let best = match places.first() {
            Some(best) => best,
            None => return Ok(None),
        };

        let coordinates = Coordinates {
            latitude: best
                .lat
                .parse()
                .context("invalid latitude in geocoder response")?,
            longitude: best
                .lon
                .parse()
                .context("invalid longitude in geocoder response")?,
        };
        debug!(
            "Geocoded \"{}\" to ({}, {})",
            place, coordinates.latitude, coordinates.longitude
        );

        Ok(Some(coordinates))
    }
}
