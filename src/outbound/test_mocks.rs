#[cfg(test)]
pub mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use crate::domain::models::{Coordinates, Credential, GeoFilter, SearchResult, StoredImage};
    use crate::domain::ports::{Geocoder, TokenExchange, VectorStore};

    /// Arguments of a similarity query recorded by the store mock.
    #[derive(Clone, Debug, PartialEq)]
    pub struct RecordedQuery {
        pub text: String,
        pub limit: usize,
        pub filter: Option<GeoFilter>,
    }

    #[derive(Default)]
    pub struct VectorStoreMock {
        pub collection_present: Mutex<bool>,
        pub create_calls: Mutex<usize>,
        pub objects: Mutex<Vec<StoredImage>>,
        pub failing_titles: Mutex<Vec<String>>,
        pub canned_results: Mutex<Vec<SearchResult>>,
        pub queries: Mutex<Vec<RecordedQuery>>,
    }

    impl VectorStoreMock {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_results(results: Vec<SearchResult>) -> Self {
            let mock = Self::default();
            *mock.canned_results.lock().unwrap() = results;
            mock
        }

        /// Makes inserts for the given title fail.
        pub fn fail_title(&self, title: &str) {
            self.failing_titles.lock().unwrap().push(title.to_string());
        }
    }

    #[async_trait]
    impl VectorStore for VectorStoreMock {
        async fn collection_exists(&self) -> Result<bool> {
            Ok(*self.collection_present.lock().unwrap())
        }

        async fn create_collection(&self) -> Result<()> {
            *self.create_calls.lock().unwrap() += 1;
            *self.collection_present.lock().unwrap() = true;
            Ok(())
        }

        async fn delete_collection(&self) -> Result<()> {
            *self.collection_present.lock().unwrap() = false;
            self.objects.lock().unwrap().clear();
            Ok(())
        }

        async fn insert(&self, image: &StoredImage) -> Result<()> {
            if self.failing_titles.lock().unwrap().contains(&image.title) {
                return Err(anyhow!("insert rejected by backend"));
            }
            self.objects.lock().unwrap().push(image.clone());
            Ok(())
        }

        async fn exists_by_url(&self, url: &str) -> Result<bool> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .any(|object| object.url == url))
        }

        async fn query_near_text(
            &self,
            text: &str,
            limit: usize,
            filter: Option<&GeoFilter>,
        ) -> Result<Vec<SearchResult>> {
            self.queries.lock().unwrap().push(RecordedQuery {
                text: text.to_string(),
                limit,
                filter: filter.copied(),
            });
            Ok(self.canned_results.lock().unwrap().clone())
        }

        async fn fetch_all(&self, limit: usize) -> Result<Vec<SearchResult>> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .take(limit)
                .map(|object| SearchResult {
                    title: object.title.clone(),
                    url: object.url.clone(),
                    extension: object.extension.clone(),
                    coordinates: object.coordinates,
                    score: None,
                })
                .collect())
        }
    }

    #[derive(Default)]
    pub struct GeocoderMock {
        pub places: Mutex<HashMap<String, Coordinates>>,
        pub fail: Mutex<bool>,
    }

    impl GeocoderMock {
        pub fn with_place(name: &str, latitude: f64, longitude: f64) -> Self {
            let mock = Self::default();
            mock.places.lock().unwrap().insert(
                name.to_string(),
                Coordinates {
                    latitude,
                    longitude,
                },
            );
            mock
        }
    }

    #[async_trait]
    impl Geocoder for GeocoderMock {
        async fn geocode(&self, place: &str) -> Result<Option<Coordinates>> {
            if *self.fail.lock().unwrap() {
                return Err(anyhow!("geocoder unreachable"));
            }
            Ok(self.places.lock().unwrap().get(place).copied())
        }
    }

    /// Hands out numbered tokens with a fixed lifetime and counts exchanges.
    pub struct TokenExchangeMock {
        pub calls: Mutex<usize>,
        pub lifetime: Duration,
    }

    impl TokenExchangeMock {
        pub fn with_lifetime(lifetime: Duration) -> Self {
            TokenExchangeMock {
                calls: Mutex::new(0),
                lifetime,
            }
        }
    }

    #[async_trait]
    impl TokenExchange for TokenExchangeMock {
        async fn exchange(&self) -> Result<Credential> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            Ok(Credential {
                token: format!("token-{}", *calls),
                expires_at: Instant::now() + self.lifetime,
            })
        }
    }

    #[tokio::test]
    async fn test_vector_store_mock() {
        let mock = VectorStoreMock::new();

        mock.create_collection().await.unwrap();
        assert!(mock.collection_exists().await.unwrap());

        let image = StoredImage {
            title: "sunset".to_string(),
            url: "https://photos.example.com/sunset.jpg".to_string(),
            extension: ".jpg".to_string(),
            image: "Zm9v".to_string(),
            coordinates: None,
        };
        mock.insert(&image).await.unwrap();

        assert!(mock
            .exists_by_url("https://photos.example.com/sunset.jpg")
            .await
            .unwrap());
        assert!(!mock.exists_by_url("https://other").await.unwrap());
        assert_eq!(mock.fetch_all(10).await.unwrap().len(), 1);

        mock.delete_collection().await.unwrap();
        assert!(!mock.collection_exists().await.unwrap());
        assert!(mock.fetch_all(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_geocoder_mock() {
        let mock = GeocoderMock::with_place("Paris", 48.8566, 2.3522);

        let hit = mock.geocode("Paris").await.unwrap().unwrap();
        assert_eq!(hit.latitude, 48.8566);
        assert!(mock.geocode("Atlantis").await.unwrap().is_none());

        *mock.fail.lock().unwrap() = true;
        assert!(mock.geocode("Paris").await.is_err());
    }
}
