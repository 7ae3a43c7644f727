use super::connection::{ConnectionProvider, WeaviateConfig};
use crate::domain::models::{Coordinates, GeoFilter, SearchResult, StoredImage};
use crate::domain::ports::VectorStore;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

pub const COLLECTION_NAME: &str = "PhotoAlbums";

const EMBEDDING_MODEL: &str = "multimodalembedding@001";
const IMAGE_WEIGHT: f64 = 0.9;
const TITLE_WEIGHT: f64 = 0.1;

/// Thin REST/GraphQL client for the vector store. Holds the pre-built HTTP
/// handle whose default headers carry the API key and bearer token.
pub struct WeaviateClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    location: String,
}

impl WeaviateClient {
    pub(crate) fn new(http: reqwest::Client, config: &WeaviateConfig) -> Self {
        WeaviateClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            location: config.location.clone(),
        }
    }

    async fn schema_class_exists(&self) -> Result<bool> {
        let response = self
            .http
            .get(format!("{}/v1/schema/{}", self.base_url, COLLECTION_NAME))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(anyhow!(
                "schema lookup returned {}: {}",
                status,
                error_message(&response.text().await.unwrap_or_default())
            )),
        }
    }

    async fn create_schema_class(&self) -> Result<()> {
        let class = json!({
            "class": COLLECTION_NAME,
            "properties": [
                {"name": "title", "dataType": ["text"]},
                {"name": "url", "dataType": ["text"]},
                {"name": "extension", "dataType": ["text"]},
                {"name": "image", "dataType": ["blob"]},
                {"name": "coordinates", "dataType": ["geoCoordinates"]},
            ],
            "vectorizer": "multi2vec-google",
            "moduleConfig": {
                "multi2vec-google": {
                    "imageFields": ["image"],
                    "textFields": ["title"],
                    "weights": {
                        "imageFields": [IMAGE_WEIGHT],
                        "textFields": [TITLE_WEIGHT],
                    },
                    "projectId": self.project_id,
                    "location": self.location,
                    "model": EMBEDDING_MODEL,
                }
            }
        });

        let response = self
            .http
            .post(format!("{}/v1/schema", self.base_url))
            .json(&class)
            .send()
            .await?;
        ensure_success(response, "unable to create the collection").await
    }

    async fn delete_schema_class(&self) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/v1/schema/{}", self.base_url, COLLECTION_NAME))
            .send()
            .await?;
        ensure_success(response, "unable to delete the collection").await
    }

    async fn insert_object(&self, image: &StoredImage) -> Result<()> {
        let body = json!({
            "class": COLLECTION_NAME,
            "properties": image,
        });

        let response = self
            .http
            .post(format!("{}/v1/objects", self.base_url))
            .json(&body)
            .send()
            .await?;
        ensure_success(response, "unable to store the image").await
    }

    async fn graphql(&self, query: String) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}/v1/graphql", self.base_url))
            .json(&json!({"query": query}))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(
                "graphql request returned {}: {}",
                status,
                error_message(&response.text().await.unwrap_or_default())
            ));
        }

        let body: Value = response.json().await?;
        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let message = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("; ");
                let message = if message.is_empty() {
                    "unknown error".to_string()
                } else {
                    message
                };
                return Err(anyhow!("graphql query failed: {}", message));
            }
        }

        Ok(body)
    }

    async fn list_objects(&self, limit: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .http
            .get(format!("{}/v1/objects", self.base_url))
            .query(&[("class", COLLECTION_NAME), ("limit", &limit.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(
                "object listing returned {}: {}",
                status,
                error_message(&response.text().await.unwrap_or_default())
            ));
        }

        let listing: ObjectListing = response.json().await?;
        Ok(listing
            .objects
            .into_iter()
            .map(|object| SearchResult {
                title: object.properties.title,
                url: object.properties.url,
                extension: object.properties.extension,
                coordinates: object.properties.coordinates,
                score: None,
            })
            .collect())
    }
}

/// Adapter from the vector store port onto the REST/GraphQL client. Every
/// verb goes through the connection provider so the handle can be rebuilt
/// underneath long-running workflows.
pub struct WeaviateStore {
    provider: Arc<ConnectionProvider>,
}

impl WeaviateStore {
    pub fn new(provider: Arc<ConnectionProvider>) -> Self {
        WeaviateStore { provider }
    }
}

#[async_trait]
impl VectorStore for WeaviateStore {
    async fn collection_exists(&self) -> Result<bool> {
        let client = self.provider.get_client().await?;
        client.schema_class_exists().await
    }

    async fn create_collection(&self) -> Result<()> {
        let client = self.provider.get_client().await?;
        client.create_schema_class().await
    }

    async fn delete_collection(&self) -> Result<()> {
        let client = self.provider.get_client().await?;
        client.delete_schema_class().await
    }

    async fn insert(&self, image: &StoredImage) -> Result<()> {
        let client = self.provider.get_client().await?;
        client.insert_object(image).await
    }

    async fn exists_by_url(&self, url: &str) -> Result<bool> {
        let client = self.provider.get_client().await?;
        let body = client.graphql(exists_query(url)).await?;

        let found = body
            .pointer(&format!("/data/Get/{}", COLLECTION_NAME))
            .and_then(Value::as_array)
            .map(|rows| !rows.is_empty())
            .unwrap_or(false);
        Ok(found)
    }

    async fn query_near_text(
        &self,
        text: &str,
        limit: usize,
        filter: Option<&GeoFilter>,
    ) -> Result<Vec<SearchResult>> {
        let client = self.provider.get_client().await?;

        let query = NearTextQuery::new(text, limit).with_geo_filter(filter).build();
        debug!("Issuing similarity query: {}", query);

        let body = client.graphql(query).await?;
        parse_rows(&body)
    }

    async fn fetch_all(&self, limit: usize) -> Result<Vec<SearchResult>> {
        let client = self.provider.get_client().await?;
        client.list_objects(limit).await
    }
}

/// Builder for `Get` similarity queries against the photo collection.
pub(crate) struct NearTextQuery<'a> {
    concepts: &'a str,
    limit: usize,
    filter: Option<&'a GeoFilter>,
}

impl<'a> NearTextQuery<'a> {
    pub(crate) fn new(concepts: &'a str, limit: usize) -> Self {
        NearTextQuery {
            concepts,
            limit,
            filter: None,
        }
    }

    pub(crate) fn with_geo_filter(mut self, filter: Option<&'a GeoFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub(crate) fn build(&self) -> String {
        let mut arguments = format!(
            "limit: {}, nearText: {{concepts: [{}]}}",
            self.limit,
            quote(self.concepts)
        );

        if let Some(filter) = self.filter {
            // The backend expects the radius in meters.
            let _ = write!(
                arguments,
                ", where: {{operator: WithinGeoRange, path: [\"coordinates\"], \
                 valueGeoRange: {{geoCoordinates: {{latitude: {}, longitude: {}}}, \
                 distance: {{max: {}}}}}}}",
                filter.latitude,
                filter.longitude,
                filter.radius_km * 1000.0
            );
        }

        format!(
            "{{ Get {{ {}({}) {{ title url extension coordinates {{ latitude longitude }} \
             _additional {{ certainty }} }} }} }}",
            COLLECTION_NAME, arguments
        )
    }
}

/// Query for the existence check on the stored-object identity field.
pub(crate) fn exists_query(url: &str) -> String {
    format!(
        "{{ Get {{ {}(limit: 1, where: {{operator: Equal, path: [\"url\"], valueText: {}}}) \
         {{ url }} }} }}",
        COLLECTION_NAME,
        quote(url)
    )
}

fn quote(text: &str) -> String {
    format!(
        "\"{}\"",
        text.replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
    )
}

#[derive(Debug, Deserialize)]
struct PhotoRow {
    title: String,
    url: String,
    extension: String,
    coordinates: Option<Coordinates>,
    #[serde(rename = "_additional")]
    additional: Option<AdditionalFields>,
}

#[derive(Debug, Deserialize)]
struct AdditionalFields {
    certainty: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ObjectListing {
    #[serde(default)]
    objects: Vec<StoredObject>,
}

#[derive(Debug, Deserialize)]
struct StoredObject {
    properties: ObjectProperties,
}

#[derive(Debug, Deserialize)]
struct ObjectProperties {
    title: String,
    url: String,
    extension: String,
    coordinates: Option<Coordinates>,
}

fn parse_rows(body: &Value) -> Result<Vec<SearchResult>> {
    let rows = body
        .pointer(&format!("/data/Get/{}", COLLECTION_NAME))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let rows: Vec<PhotoRow> = serde_json::from_value(Value::Array(rows))
        .context("unexpected similarity query response")?;

    Ok(rows
        .into_iter()
        .map(|row| SearchResult {
            title: row.title,
            url: row.url,
            extension: row.extension,
            coordinates: row.coordinates,
            score: row.additional.and_then(|a| a.certainty),
        })
        .collect())
}

async fn ensure_success(response: reqwest::Response, what: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("{} ({}): {}", what, status, error_message(&body)))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/0/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_text_query_without_filter() {
        let query = NearTextQuery::new("sunset at the beach", 5).build();

        assert!(query.contains("PhotoAlbums(limit: 5"));
        assert!(query.contains("nearText: {concepts: [\"sunset at the beach\"]}"));
        assert!(query.contains("_additional { certainty }"));
        assert!(!query.contains("WithinGeoRange"));
    }

    #[test]
    fn test_near_text_query_with_geo_filter() {
        let filter = GeoFilter {
            latitude: 48.8566,
            longitude: 2.3522,
            radius_km: 10.0,
        };
        let query = NearTextQuery::new("sunset", 5)
            .with_geo_filter(Some(&filter))
            .build();

        assert!(query.contains("operator: WithinGeoRange"));
        assert!(query.contains("path: [\"coordinates\"]"));
        assert!(query.contains("latitude: 48.8566, longitude: 2.3522"));
        assert!(query.contains("distance: {max: 10000}"));
    }

    #[test]
    fn test_quote_escapes_embedded_strings() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quote("a\\b"), "\"a\\\\b\"");
    }

    #[test]
    fn test_exists_query_matches_on_the_url() {
        let query = exists_query("https://photos.example.com/sunset.jpg");

        assert!(query.contains("limit: 1"));
        assert!(query.contains("operator: Equal"));
        assert!(query.contains("path: [\"url\"]"));
        assert!(query.contains("valueText: \"https://photos.example.com/sunset.jpg\""));
    }

    #[test]
    fn test_parse_rows_maps_results() {
        let body = json!({
            "data": {
                "Get": {
                    "PhotoAlbums": [
                        {
                            "title": "sunset",
                            "url": "https://photos.example.com/sunset.jpg",
                            "extension": ".jpg",
                            "coordinates": {"latitude": 48.8566, "longitude": 2.3522},
                            "_additional": {"certainty": 0.92}
                        },
                        {
                            "title": "harbour",
                            "url": "https://photos.example.com/harbour.png",
                            "extension": ".png",
                            "coordinates": null,
                            "_additional": null
                        }
                    ]
                }
            }
        });

        let results = parse_rows(&body).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "sunset");
        assert_eq!(results[0].score, Some(0.92));
        assert_eq!(results[0].coordinates.unwrap().latitude, 48.8566);
        assert_eq!(results[1].score, None);
        assert!(results[1].coordinates.is_none());
    }

    #[test]
    fn test_parse_rows_with_empty_body() {
        let results = parse_rows(&json!({"data": {"Get": {"PhotoAlbums": []}}})).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message("{\"error\":[{\"message\":\"class already exists\"}]}"),
            "class already exists"
        );
        assert_eq!(error_message("connection refused"), "connection refused");
    }
}
