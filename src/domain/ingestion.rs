use super::models::{ImageRecord, StoredImage, UploadOutcome, UploadReport};
use super::ports::VectorStore;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{debug, info};

pub struct IngestionPipeline {
    store: Arc<dyn VectorStore>,
    base_url: String,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn VectorStore>, base_url: impl Into<String>) -> Self {
        IngestionPipeline {
            store,
            base_url: base_url.into(),
        }
    }

    /// Uploads the records in contiguous batches, one record at a time.
    /// Per-record failures are collected in the report and never abort the
    /// run; the report always accounts for every record.
    pub async fn ingest(
        &self,
        records: &[ImageRecord],
        batch_size: usize,
        skip_existing: bool,
    ) -> Result<UploadReport> {
        let batch_size = batch_size.max(1);

        // Create a progress bar with the total length of the vector.
        let progress_bar = ProgressBar::new(records.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("Uploading [{elapsed_precise}] [{wide_bar}] {pos}/{len} ({eta})")?,
        );

        let mut report = UploadReport::default();

        for batch in records.chunks(batch_size) {
            debug!("Processing batch of {} record(s)", batch.len());

            for record in batch {
                let outcome = self.process_record(record, skip_existing).await;
                report.record(record, outcome);
                progress_bar.inc(1);
            }
        }

        progress_bar.finish_with_message("All records have been processed.");

        Ok(report)
    }

    async fn process_record(&self, record: &ImageRecord, skip_existing: bool) -> UploadOutcome {
        let stored = StoredImage::from_record(record, &self.base_url);

        if skip_existing {
            match self.store.exists_by_url(&stored.url).await {
                Ok(true) => {
                    info!("Skipping {} because it is already stored", record.path);
                    return UploadOutcome::SkippedExisting;
                }
                Ok(false) => {}
                Err(e) => return UploadOutcome::Failed(error_reason(e)),
            }
        }

        match self.store.insert(&stored).await {
            Ok(()) => UploadOutcome::Uploaded,
            Err(e) => UploadOutcome::Failed(error_reason(e)),
        }
    }
}

fn error_reason(error: anyhow::Error) -> String {
    let reason = error.to_string();
    if reason.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Coordinates;
    use crate::outbound::test_mocks::tests::VectorStoreMock;

    const BASE_URL: &str = "https://photos.example.com/";

    fn record(name: &str, coordinates: Option<Coordinates>) -> ImageRecord {
        ImageRecord {
            name: name.to_string(),
            path: format!("/photos/{}.jpg", name),
            extension: ".jpg".to_string(),
            size: 3,
            base64: "Zm9v".to_string(),
            coordinates,
        }
    }

    fn sample_records() -> Vec<ImageRecord> {
        vec![
            record(
                "a",
                Some(Coordinates {
                    latitude: 1.0,
                    longitude: 2.0,
                }),
            ),
            record("b", None),
            record("c", None),
        ]
    }

    #[tokio::test]
    async fn test_ingest_uploads_all_records() {
        let store = Arc::new(VectorStoreMock::new());
        let pipeline = IngestionPipeline::new(store.clone(), BASE_URL);

        let report = pipeline.ingest(&sample_records(), 2, false).await.unwrap();

        assert_eq!(report.success, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.total(), 3);

        let objects = store.objects.lock().unwrap();
        assert_eq!(objects.len(), 3);
        assert_eq!(objects[0].url, "https://photos.example.com/a.jpg");
        assert!(objects[0].coordinates.is_some());
        assert!(objects[1].coordinates.is_none());
    }

    #[tokio::test]
    async fn test_second_run_skips_existing_records() {
        let store = Arc::new(VectorStoreMock::new());
        let pipeline = IngestionPipeline::new(store.clone(), BASE_URL);

        pipeline.ingest(&sample_records(), 2, true).await.unwrap();
        let report = pipeline.ingest(&sample_records(), 2, true).await.unwrap();

        assert_eq!(report.success, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(report.skipped, 3);

        // Nothing was inserted twice.
        assert_eq!(store.objects.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_record_does_not_abort_the_run() {
        let store = Arc::new(VectorStoreMock::new());
        store.fail_title("b");
        let pipeline = IngestionPipeline::new(store.clone(), BASE_URL);

        let report = pipeline.ingest(&sample_records(), 2, false).await.unwrap();

        assert_eq!(report.success, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.total(), 3);
        assert_eq!(report.failures, vec!["b.jpg: insert rejected by backend"]);
    }

    #[tokio::test]
    async fn test_report_accounts_for_every_record() {
        let store = Arc::new(VectorStoreMock::new());
        store.fail_title("a");
        let pipeline = IngestionPipeline::new(store.clone(), BASE_URL);

        pipeline.ingest(&sample_records(), 2, false).await.unwrap();
        let report = pipeline.ingest(&sample_records(), 1, true).await.unwrap();

        // "a" keeps failing, "b" and "c" were stored by run one.
        assert_eq!(report.total(), 3);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.failed, 1);
    }
}
