//! Per-item ingestion pipeline.
//!
//! Drives one image through extract → create → finalize URL → upload, or one
//! quote through extract → persist. Steps run strictly in order and nothing
//! is rolled back: a failure after the first write leaves the record in the
//! `pending` state for the reconciliation sweep to find. Publishing the
//! snapshot is left to the caller.

use crate::catalog_store::CatalogStore;
use crate::error::{IngestError, Result};
use crate::extractor::{self, content_type_for};
use crate::models::{MediaRecord, NewQuote, QuoteRecord, RecordStatus};
use crate::object_store::{image_key, ObjectStore};
use crate::schema::QuoteSubmission;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Static settings the orchestrator needs beyond its stores
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Bucket name embedded in record URLs
    pub bucket: String,
    /// Key prefix for raw image objects
    pub images_prefix: String,
    /// Language tag for ingested records
    pub default_lang: String,
}

/// Ingestion orchestrator for single items
pub struct IngestOrchestrator {
    catalog: Arc<dyn CatalogStore>,
    objects: Arc<dyn ObjectStore>,
    settings: OrchestratorSettings,
}

impl IngestOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        objects: Arc<dyn ObjectStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            catalog,
            objects,
            settings,
        }
    }

    /// Ingest one raw image and return the finalized record
    #[instrument(skip(self, data), fields(file_name = %file_name, size_bytes = data.len()))]
    pub async fn ingest_one(&self, data: Vec<u8>, file_name: &str) -> Result<MediaRecord> {
        let result = self.run_media_steps(data, file_name).await;

        match &result {
            Ok(record) => {
                metrics::counter!("catalog.media.ingested").increment(1);
                info!(record_id = ?record.id, url = %record.url, "Media ingested");
            }
            Err(e) => {
                metrics::counter!("catalog.media.failed", "reason" => e.code()).increment(1);
            }
        }

        result
    }

    async fn run_media_steps(&self, data: Vec<u8>, file_name: &str) -> Result<MediaRecord> {
        validate_file_name(file_name)?;

        // Step 1: extract. Decoding is CPU-bound, keep it off the async workers.
        let (design, data) = {
            let name = file_name.to_string();
            tokio::task::spawn_blocking(move || {
                extractor::extract_design(&data, &name).map(|design| (design, data))
            })
            .await
            .map_err(|e| IngestError::unsupported(file_name, format!("extraction aborted: {e}")))??
        };

        let mut record = MediaRecord {
            id: None,
            design,
            lang: self.settings.default_lang.clone(),
            url: MediaRecord::provisional_url(&self.settings.bucket, file_name),
            status: RecordStatus::Pending,
        };

        // Step 2: first write assigns the identity
        let id = self.catalog.create_media_record(&record).await?;
        record.id = Some(id);
        debug!(record_id = id, "Provisional media record persisted");

        // Step 3: second write makes the URL encode the identity
        record.url = MediaRecord::final_url(&self.settings.bucket, id, file_name);
        if let Err(e) = self.catalog.update_media_record(&record).await {
            warn!(record_id = id, error = %e, "URL finalization failed, record left pending");
            return Err(e);
        }

        // Step 4: relocate the raw asset under the identity-qualified key
        let key = image_key(
            &self.settings.images_prefix,
            &MediaRecord::storage_name(id, file_name),
        );
        let content_type = content_type_for(&record.design.file_format);
        let started = Instant::now();
        if let Err(e) = self.objects.put_object(&key, data, content_type).await {
            warn!(record_id = id, s3_key = %key, error = %e, "Asset upload failed, record orphaned");
            return Err(e);
        }
        metrics::histogram!("catalog.upload.duration_seconds")
            .record(started.elapsed().as_secs_f64());

        // Step 5: the blob exists, close out the pending state. A failure here
        // leaves the record for the reconciliation sweep.
        record.status = RecordStatus::Finalized;
        if let Err(e) = self.catalog.update_media_record(&record).await {
            warn!(record_id = id, error = %e, "Status finalization failed, record left pending");
            record.status = RecordStatus::Pending;
        }

        Ok(record)
    }

    /// Convert one spreadsheet row into a quote; rows with fewer than two
    /// cells yield `None`
    pub fn quote_from_row(&self, row: &[String]) -> Option<NewQuote> {
        if row.len() < 2 {
            return None;
        }

        Some(NewQuote {
            text: row[1].clone(),
            tags: split_tag_cell(&row[0]),
            lang: self.settings.default_lang.clone(),
        })
    }

    /// Persist one chunk of quotes; the chunk commits or fails as a unit
    #[instrument(skip(self, chunk), fields(chunk_len = chunk.len()))]
    pub async fn persist_quote_chunk(&self, chunk: &[NewQuote]) -> Result<Vec<QuoteRecord>> {
        let ids = self.catalog.create_quotes(chunk).await?;

        if ids.len() != chunk.len() {
            return Err(IngestError::persistence(
                "create_quotes",
                anyhow::anyhow!("expected {} identities, store returned {}", chunk.len(), ids.len()),
            ));
        }

        metrics::counter!("catalog.quotes.persisted").increment(ids.len() as u64);

        Ok(chunk
            .iter()
            .cloned()
            .zip(ids)
            .map(|(quote, id)| quote.with_id(id))
            .collect())
    }

    /// Persist a single validated quote submission
    #[instrument(skip(self, submission))]
    pub async fn ingest_quote(&self, submission: QuoteSubmission) -> Result<QuoteRecord> {
        let quote = NewQuote {
            text: submission.text,
            tags: submission.tags,
            lang: submission
                .lang
                .filter(|lang| !lang.is_empty())
                .unwrap_or_else(|| self.settings.default_lang.clone()),
        };

        let mut records = self.persist_quote_chunk(std::slice::from_ref(&quote)).await?;
        let record = records.pop().ok_or_else(|| {
            IngestError::persistence("create_quotes", anyhow::anyhow!("no identity returned"))
        })?;

        info!(quote_id = record.id, "Quote ingested");
        Ok(record)
    }
}

/// Comma-separated tag cell with all spaces removed; blank cells yield no tags
pub fn split_tag_cell(raw: &str) -> Vec<String> {
    let cleaned: String = raw.chars().filter(|c| *c != ' ').collect();
    if cleaned.is_empty() {
        return Vec::new();
    }
    cleaned.split(',').map(String::from).collect()
}

/// File names become object keys; reject anything that is not a bare name
fn validate_file_name(file_name: &str) -> Result<()> {
    if file_name.is_empty() || file_name.contains('/') || file_name.contains('\\') {
        return Err(IngestError::unsupported(
            file_name,
            "file name must be a bare name without path separators",
        ));
    }
    Ok(())
}
