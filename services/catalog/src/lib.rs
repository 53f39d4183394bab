//! Catalog Service
//!
//! Ingests raw media files and quote rows into the content catalog and keeps
//! the published metadata snapshots in line with the catalog after every
//! ingestion.
//!
//! ## Features
//!
//! - **Attribute Extraction**: decodes JPEG/PNG/GIF images to derive
//!   resolution, orientation, codec and filename tags
//! - **Catalog Persistence**: PostgreSQL-backed media and quote records, quote
//!   chunks committed one transaction at a time
//! - **Object Storage**: raw assets and snapshots on S3 (or MinIO/LocalStack),
//!   multipart uploads for large objects
//! - **Snapshot Publishing**: full-collection JSON documents staged locally and
//!   uploaded under a fixed key
//! - **Reconciliation**: sweep over records an interrupted ingestion left
//!   `pending`
//!
//! ## Architecture
//!
//! ```text
//!  Import dir / upload       Spreadsheet link
//! ┌──────────────┐          ┌──────────────┐
//! │ Batch        │◀─────────│ Sheets       │
//! │ Importer     │          │ Source       │
//! └──────────────┘          └──────────────┘
//!        │
//!        ▼
//! ┌──────────────┐   decode  ┌──────────────┐
//! │ Ingest       │──────────▶│ Extractor    │
//! │ Orchestrator │           └──────────────┘
//! └──────────────┘
//!        │  create / finalize URL        put raw asset
//!        ├──────────────────────┐      ┌──────────────┐
//!        ▼                      │      ▼              │
//! ┌──────────────┐              │ ┌──────────────┐    │
//! │ Catalog      │              └▶│ Object       │    │
//! │ Store (PG)   │                │ Store (S3)   │    │
//! └──────────────┘                └──────────────┘    │
//!        │ full collection               ▲            │
//!        ▼                               │ snapshot   │
//! ┌──────────────┐                       │            │
//! │ Metadata     │───────────────────────┘            │
//! │ Synchronizer │                                    │
//! └──────────────┘        ┌──────────────┐            │
//!                         │ Reconciler   │────────────┘
//!                         └──────────────┘
//! ```

pub mod batch;
pub mod catalog_store;
pub mod config;
pub mod error;
pub mod extractor;
pub mod models;
pub mod object_store;
pub mod orchestrator;
pub mod reconcile;
pub mod schema;
pub mod sheets;
pub mod synchronizer;

pub use batch::{BatchImporter, BatchSettings};
pub use catalog_store::{CatalogStore, PgCatalogStore};
pub use config::Config;
pub use error::{IngestError, Result};
pub use models::{
    BatchOutcome, BatchReport, Collection, Design, MediaRecord, NewQuote, Orientation,
    QuoteRecord, RecordId, RecordStatus, Resolution, SheetImportReport, SnapshotSummary,
    UploadReceipt,
};
pub use object_store::{ObjectStore, S3ObjectStore};
pub use orchestrator::{IngestOrchestrator, OrchestratorSettings};
pub use reconcile::{ReconcileReport, Reconciler};
pub use schema::QuoteSubmission;
pub use sheets::{GoogleSheetsSource, SheetLinkValidator, SpreadsheetSource};
pub use synchronizer::{MetadataSynchronizer, SnapshotSummaries};
