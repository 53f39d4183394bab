//! Batch and single-item entry points.
//!
//! Each entry point drives the orchestrator over its source and then publishes
//! the affected collection exactly once. File batches count per-item failures
//! and keep going; spreadsheet imports stop at the first failed chunk.

use crate::error::{IngestError, Result};
use crate::extractor::has_supported_extension;
use crate::models::{BatchOutcome, Collection, QuoteRecord, SheetImportReport, UploadReceipt};
use crate::orchestrator::IngestOrchestrator;
use crate::schema::QuoteSubmission;
use crate::sheets::{SheetLinkValidator, SpreadsheetSource};
use crate::synchronizer::MetadataSynchronizer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Tunables for the batch entry points
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Quotes persisted per transaction
    pub chunk_size: usize,
    /// Spreadsheet range to read
    pub sheet_range: String,
    /// Largest accepted single upload
    pub max_upload_bytes: u64,
}

pub struct BatchImporter {
    orchestrator: Arc<IngestOrchestrator>,
    synchronizer: Arc<MetadataSynchronizer>,
    sheets: Arc<dyn SpreadsheetSource>,
    links: SheetLinkValidator,
    settings: BatchSettings,
}

impl BatchImporter {
    pub fn new(
        orchestrator: Arc<IngestOrchestrator>,
        synchronizer: Arc<MetadataSynchronizer>,
        sheets: Arc<dyn SpreadsheetSource>,
        links: SheetLinkValidator,
        settings: BatchSettings,
    ) -> Self {
        Self {
            orchestrator,
            synchronizer,
            sheets,
            links,
            settings: BatchSettings {
                chunk_size: settings.chunk_size.max(1),
                ..settings
            },
        }
    }

    /// Ingest every image file in `dir`, then publish the media snapshot
    #[instrument(skip(self), fields(import_id = %Uuid::new_v4(), dir = %dir.display()))]
    pub async fn import_directory(&self, dir: &Path) -> Result<BatchOutcome> {
        let files = list_files(dir).await?;
        let mut outcome = BatchOutcome::default();

        for path in files {
            let file_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => {
                    warn!(path = %path.display(), "Skipping file with non UTF-8 name");
                    outcome.record_failure();
                    continue;
                }
            };

            if !has_supported_extension(&file_name) {
                warn!(file_name = %file_name, "Unsupported file extension");
                outcome.record_failure();
                continue;
            }

            let data = match tokio::fs::read(&path).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(file_name = %file_name, error = %e, "Failed to read file");
                    outcome.record_failure();
                    continue;
                }
            };

            match self.orchestrator.ingest_one(data, &file_name).await {
                Ok(_) => outcome.record_success(),
                Err(e) => {
                    warn!(file_name = %file_name, error = %e, code = e.code(), "Failed to ingest file");
                    outcome.record_failure();
                }
            }
        }

        self.synchronizer.publish(Collection::Media).await?;

        info!(
            success_count = outcome.success_count,
            failure_count = outcome.failure_count,
            "Directory import complete"
        );
        Ok(outcome)
    }

    /// Import quotes from a spreadsheet link, then publish the quote snapshot
    #[instrument(skip(self), fields(import_id = %Uuid::new_v4()))]
    pub async fn import_sheet(&self, link: &str) -> Result<SheetImportReport> {
        let spreadsheet_id = self.links.spreadsheet_id(link)?;
        let rows = self
            .sheets
            .get_rows(&spreadsheet_id, &self.settings.sheet_range)
            .await?;

        // First row is the header
        let data_rows = rows.get(1..).unwrap_or_default();
        let quotes: Vec<_> = data_rows
            .iter()
            .filter_map(|row| self.orchestrator.quote_from_row(row))
            .collect();

        let mut report = SheetImportReport {
            rows_read: data_rows.len(),
            quotes_persisted: 0,
            chunks: 0,
        };

        for (index, chunk) in quotes.chunks(self.settings.chunk_size).enumerate() {
            let persisted = self
                .orchestrator
                .persist_quote_chunk(chunk)
                .await
                .inspect_err(|e| {
                    warn!(
                        chunk = index,
                        committed = report.quotes_persisted,
                        error = %e,
                        "Quote chunk failed, aborting import"
                    )
                })?;

            report.chunks += 1;
            report.quotes_persisted += persisted.len();
            debug!(chunk = index, inserted = persisted.len(), "Quote chunk committed");
        }

        self.synchronizer.publish(Collection::Quotes).await?;

        info!(
            rows_read = report.rows_read,
            quotes_persisted = report.quotes_persisted,
            chunks = report.chunks,
            "Spreadsheet import complete"
        );
        Ok(report)
    }

    /// Ingest one uploaded image, then publish the media snapshot
    #[instrument(skip(self, data), fields(size_bytes = data.len()))]
    pub async fn upload(&self, data: Vec<u8>, file_name: &str) -> Result<UploadReceipt> {
        self.check_upload_size(file_name, data.len() as u64)?;

        let record = self.orchestrator.ingest_one(data, file_name).await?;
        self.synchronizer.publish(Collection::Media).await?;

        let id = record.id.ok_or_else(|| {
            IngestError::persistence("create_media_record", anyhow::anyhow!("no identity assigned"))
        })?;

        Ok(UploadReceipt {
            id,
            file_name: record.design.file_name,
        })
    }

    /// Upload a file from disk. The size limit is checked against the file
    /// metadata before any bytes are read.
    pub async fn upload_file(&self, path: &Path) -> Result<UploadReceipt> {
        let source = path.display().to_string();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| IngestError::source_read(&source, "no usable file name"))?;

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| IngestError::source_read(&source, e))?;
        if !metadata.is_file() {
            return Err(IngestError::source_read(&source, "not a regular file"));
        }
        self.check_upload_size(file_name, metadata.len())?;

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| IngestError::source_read(&source, e))?;
        self.upload(data, file_name).await
    }

    fn check_upload_size(&self, file_name: &str, len: u64) -> Result<()> {
        if len > self.settings.max_upload_bytes {
            return Err(IngestError::unsupported(
                file_name,
                format!(
                    "upload of {len} bytes exceeds the {} byte limit",
                    self.settings.max_upload_bytes
                ),
            ));
        }
        Ok(())
    }

    /// Validate and persist one quote submission, then publish the quote snapshot
    pub async fn submit_quote(&self, raw: &[u8]) -> Result<QuoteRecord> {
        let submission = QuoteSubmission::from_json(raw)?;
        let record = self.orchestrator.ingest_quote(submission).await?;
        self.synchronizer.publish(Collection::Quotes).await?;
        Ok(record)
    }
}

/// Regular files of `dir` sorted by name; subdirectories are skipped
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let source_name = dir.display().to_string();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| IngestError::source_read(&source_name, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| IngestError::source_read(&source_name, e))?
    {
        let is_dir = match entry.file_type().await {
            Ok(file_type) => file_type.is_dir(),
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Cannot stat entry");
                false
            }
        };
        if is_dir {
            debug!(path = %entry.path().display(), "Skipping directory");
            continue;
        }
        files.push(entry.path());
    }

    files.sort();
    Ok(files)
}
