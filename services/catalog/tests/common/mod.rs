//! In-memory stores for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use catalog_service::config::{MetadataConfig, SheetsConfig};
use catalog_service::{
    BatchImporter, BatchSettings, CatalogStore, IngestError, IngestOrchestrator, MediaRecord,
    MetadataSynchronizer, NewQuote, ObjectStore, OrchestratorSettings, QuoteRecord, RecordId,
    RecordStatus, Reconciler, Result, SheetLinkValidator, SpreadsheetSource,
};
use image::{DynamicImage, ImageFormat};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const BUCKET: &str = "flyers";
pub const SHEET_LINK: &str = "https://docs.google.com/spreadsheets/d/quotes-sheet/edit#gid=0";

#[derive(Default)]
struct CatalogState {
    next_id: RecordId,
    media: BTreeMap<RecordId, MediaRecord>,
    quotes: Vec<QuoteRecord>,
    chunk_calls: Vec<usize>,
}

/// Catalog store backed by process memory
#[derive(Default)]
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
    fail_create_for: Mutex<HashSet<String>>,
    fail_quote_chunk: Mutex<Option<usize>>,
}

impl MemoryCatalog {
    /// Make `create_media_record` fail for this file name
    pub fn fail_create_for(&self, file_name: &str) {
        self.fail_create_for
            .lock()
            .unwrap()
            .insert(file_name.to_string());
    }

    /// Make the n-th `create_quotes` call (1-based) fail
    pub fn fail_quote_chunk(&self, call: usize) {
        *self.fail_quote_chunk.lock().unwrap() = Some(call);
    }

    /// Lengths of every chunk passed to `create_quotes`, failed ones included
    pub fn chunk_calls(&self) -> Vec<usize> {
        self.state.lock().unwrap().chunk_calls.clone()
    }

    pub fn media(&self) -> Vec<MediaRecord> {
        self.state.lock().unwrap().media.values().cloned().collect()
    }

    pub fn quote_count(&self) -> usize {
        self.state.lock().unwrap().quotes.len()
    }

    pub fn insert_media(&self, mut record: MediaRecord) -> RecordId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        record.id = Some(id);
        state.media.insert(id, record);
        id
    }
}

fn injected(operation: &'static str) -> IngestError {
    IngestError::persistence(operation, anyhow::anyhow!("injected failure"))
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn create_media_record(&self, record: &MediaRecord) -> Result<RecordId> {
        if self
            .fail_create_for
            .lock()
            .unwrap()
            .contains(&record.design.file_name)
        {
            return Err(injected("create_media_record"));
        }
        Ok(self.insert_media(record.clone()))
    }

    async fn update_media_record(&self, record: &MediaRecord) -> Result<()> {
        let id = record.id.ok_or_else(|| injected("update_media_record"))?;
        let mut state = self.state.lock().unwrap();
        match state.media.get_mut(&id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(injected("update_media_record")),
        }
    }

    async fn list_media_records(&self) -> Result<Vec<MediaRecord>> {
        Ok(self.media())
    }

    async fn list_pending_media_records(&self) -> Result<Vec<MediaRecord>> {
        Ok(self
            .media()
            .into_iter()
            .filter(|r| r.status == RecordStatus::Pending)
            .collect())
    }

    async fn create_quotes(&self, quotes: &[NewQuote]) -> Result<Vec<RecordId>> {
        let mut state = self.state.lock().unwrap();
        state.chunk_calls.push(quotes.len());

        if *self.fail_quote_chunk.lock().unwrap() == Some(state.chunk_calls.len()) {
            return Err(injected("create_quotes"));
        }

        let mut ids = Vec::with_capacity(quotes.len());
        for quote in quotes {
            state.next_id += 1;
            let id = state.next_id;
            state.quotes.push(quote.clone().with_id(id));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn list_quotes(&self) -> Result<Vec<QuoteRecord>> {
        Ok(self.state.lock().unwrap().quotes.clone())
    }
}

/// Object store backed by process memory
#[derive(Default)]
pub struct MemoryObjects {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_keys: Mutex<HashSet<String>>,
}

impl MemoryObjects {
    pub fn fail_key(&self, key: &str) {
        self.fail_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn put(&self, key: &str, body: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), body);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    async fn put_object(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<()> {
        if self.fail_keys.lock().unwrap().contains(key) {
            return Err(IngestError::storage(
                "put_object",
                key,
                anyhow::anyhow!("injected failure"),
            ));
        }
        self.put(key, body);
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}

/// Spreadsheet source serving fixed rows
#[derive(Default)]
pub struct FixedSheet {
    pub rows: Vec<Vec<String>>,
}

#[async_trait]
impl SpreadsheetSource for FixedSheet {
    async fn get_rows(&self, source_id: &str, _range: &str) -> Result<Vec<Vec<String>>> {
        if self.rows.is_empty() {
            return Err(IngestError::source_read(source_id, "no data found"));
        }
        Ok(self.rows.clone())
    }
}

/// Fully wired pipeline over in-memory stores
pub struct Harness {
    pub catalog: Arc<MemoryCatalog>,
    pub objects: Arc<MemoryObjects>,
    pub importer: BatchImporter,
    pub synchronizer: Arc<MetadataSynchronizer>,
    pub reconciler: Reconciler,
    pub metadata: MetadataConfig,
    pub staging: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_sheet(FixedSheet::default())
    }

    pub fn with_sheet(sheet: FixedSheet) -> Self {
        let staging = tempfile::tempdir().unwrap();
        let catalog = Arc::new(MemoryCatalog::default());
        let objects = Arc::new(MemoryObjects::default());

        let mut metadata = MetadataConfig::default();
        metadata.media.staging_path = staging.path().join("metadata/imagesMetadata.json");
        metadata.quotes.staging_path = staging.path().join("metadata/quotesMetadata.json");

        let orchestrator = Arc::new(IngestOrchestrator::new(
            catalog.clone(),
            objects.clone(),
            OrchestratorSettings {
                bucket: BUCKET.to_string(),
                images_prefix: "images/".to_string(),
                default_lang: "en-US".to_string(),
            },
        ));
        let synchronizer = Arc::new(MetadataSynchronizer::new(
            catalog.clone(),
            objects.clone(),
            metadata.clone(),
        ));
        let importer = BatchImporter::new(
            orchestrator,
            synchronizer.clone(),
            Arc::new(sheet),
            SheetLinkValidator::new(&SheetsConfig::default().link_pattern).unwrap(),
            BatchSettings {
                chunk_size: 100,
                sheet_range: "English".to_string(),
                max_upload_bytes: 10 << 20,
            },
        );
        let reconciler = Reconciler::new(
            catalog.clone(),
            objects.clone(),
            synchronizer.clone(),
            BUCKET,
            "images/",
            4,
        );

        Self {
            catalog,
            objects,
            importer,
            synchronizer,
            reconciler,
            metadata,
            staging,
        }
    }

    /// Parsed media snapshot as staged on disk
    pub fn staged_media(&self) -> serde_json::Value {
        read_json(&self.metadata.media.staging_path)
    }

    /// Parsed quote snapshot as staged on disk
    pub fn staged_quotes(&self) -> serde_json::Value {
        read_json(&self.metadata.quotes.staging_path)
    }
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

/// Encoded image of the given dimensions
pub fn encode_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut buf, format)
        .unwrap();
    buf.into_inner()
}

/// Write `files` into a fresh directory
pub fn import_dir(files: &[(&str, Vec<u8>)]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    for (name, body) in files {
        std::fs::write(dir.path().join(name), body).unwrap();
    }
    let path = dir.path().to_path_buf();
    (dir, path)
}

/// Spreadsheet rows: a header followed by `count` quote rows
pub fn quote_rows(count: usize) -> Vec<Vec<String>> {
    let mut rows = vec![vec!["tags".to_string(), "text".to_string()]];
    rows.extend((0..count).map(|i| vec![format!("tag{i}, common"), format!("Quote number {i}")]));
    rows
}
