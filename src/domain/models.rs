use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// A latitude/longitude pair as stored alongside a photo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A single image as produced by the image source: file metadata plus the
/// base64-encoded file content and the GPS position when the file carries one.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub name: String,
    pub path: String,
    pub extension: String,
    pub size: u64,
    pub base64: String,
    pub coordinates: Option<Coordinates>,
}

/// The object shape stored in the photo collection. The `coordinates`
/// property is left out of the serialized object entirely when the source
/// record has none.
#[derive(Debug, Clone, Serialize)]
pub struct StoredImage {
    pub title: String,
    pub url: String,
    pub extension: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl StoredImage {
    pub fn from_record(record: &ImageRecord, base_url: &str) -> Self {
        StoredImage {
            title: record.name.clone(),
            url: format!("{}{}{}", base_url, record.name, record.extension),
            extension: record.extension.clone(),
            image: record.base64.clone(),
            coordinates: record.coordinates,
        }
    }
}

/// Outcome of processing a single record during ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Uploaded,
    SkippedExisting,
    Failed(String),
}

/// Aggregated result of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<String>,
}

impl UploadReport {
    pub fn record(&mut self, record: &ImageRecord, outcome: UploadOutcome) {
        match outcome {
            UploadOutcome::Uploaded => self.success += 1,
            UploadOutcome::SkippedExisting => self.skipped += 1,
            UploadOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures
                    .push(format!("{}{}: {}", record.name, record.extension, reason));
            }
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.failed + self.skipped
    }
}

impl fmt::Display for UploadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} uploaded, {} skipped, {} failed",
            self.success, self.skipped, self.failed
        )
    }
}

/// A single row returned by a similarity query or an inventory listing.
/// `score` is the backend certainty (higher is better); listings carry none.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub extension: String,
    pub coordinates: Option<Coordinates>,
    pub score: Option<f64>,
}

/// Radius constraint around a geocoded place, applied to similarity queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFilter {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

/// A bearer token for the embedding backend together with its expiry.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, coordinates: Option<Coordinates>) -> ImageRecord {
        ImageRecord {
            name: name.to_string(),
            path: format!("/photos/{}.jpg", name),
            extension: ".jpg".to_string(),
            size: 42,
            base64: "aGVsbG8=".to_string(),
            coordinates,
        }
    }

    #[test]
    fn test_stored_image_from_record() {
        let stored = StoredImage::from_record(
            &record(
                "sunset",
                Some(Coordinates {
                    latitude: 1.0,
                    longitude: 2.0,
                }),
            ),
            "https://photos.example.com/",
        );

        assert_eq!(stored.title, "sunset");
        assert_eq!(stored.url, "https://photos.example.com/sunset.jpg");
        assert_eq!(stored.extension, ".jpg");
        assert_eq!(stored.image, "aGVsbG8=");
        assert!(stored.coordinates.is_some());
    }

    #[test]
    fn test_stored_image_omits_missing_coordinates() {
        let stored = StoredImage::from_record(&record("sunset", None), "https://p/");

        let value = serde_json::to_value(&stored).unwrap();
        assert!(value.get("coordinates").is_none());

        let with_gps = StoredImage::from_record(
            &record(
                "beach",
                Some(Coordinates {
                    latitude: 48.8566,
                    longitude: 2.3522,
                }),
            ),
            "https://p/",
        );
        let value = serde_json::to_value(&with_gps).unwrap();
        assert_eq!(
            value.pointer("/coordinates/latitude").unwrap().as_f64(),
            Some(48.8566)
        );
    }

    #[test]
    fn test_upload_report_counts() {
        let mut report = UploadReport::default();
        report.record(&record("a", None), UploadOutcome::Uploaded);
        report.record(&record("b", None), UploadOutcome::SkippedExisting);
        report.record(
            &record("c", None),
            UploadOutcome::Failed("backend unavailable".to_string()),
        );

        assert_eq!(report.success, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.total(), 3);
        assert_eq!(report.failures, vec!["c.jpg: backend unavailable"]);
        assert_eq!(report.to_string(), "1 uploaded, 1 skipped, 1 failed");
    }
}
