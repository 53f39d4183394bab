//! Canonical records shared by the pipeline components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity assigned by the catalog store on first persist
pub type RecordId = i64;

/// Pixel dimensions of a media asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    /// Unit of the dimensions, 1 = pixels
    pub unit: i32,
}

/// Orientation derived from the decoded dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// Landscape only when strictly wider than tall; squares are portrait
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width > height {
            Self::Landscape
        } else {
            Self::Portrait
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
        }
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "landscape" => Ok(Self::Landscape),
            "portrait" => Ok(Self::Portrait),
            other => Err(format!("unknown orientation: {other}")),
        }
    }
}

/// Structural attributes of a media asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Design {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub resolution: Resolution,
    #[serde(rename = "type")]
    pub content_type: String,
    pub tags: Vec<String>,
    /// Uppercase codec name (JPEG, PNG, GIF)
    pub file_format: String,
    pub orientation: Orientation,
    pub file_name: String,
}

/// Lifecycle of a media record across the non-atomic ingestion steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Persisted, blob not yet confirmed in the object store
    Pending,
    /// URL encodes the identity and the blob is stored
    Finalized,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Finalized => "finalized",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "finalized" => Ok(Self::Finalized),
            other => Err(format!("unknown record status: {other}")),
        }
    }
}

/// Media record ("flyer") as stored in the catalog and published in snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    /// None until the catalog store assigns an identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub design: Design,
    pub lang: String,
    pub url: String,
    pub status: RecordStatus,
}

impl MediaRecord {
    /// Object key fragment for a persisted record: `{id}_{fileName}`
    pub fn storage_name(id: RecordId, file_name: &str) -> String {
        format!("{id}_{file_name}")
    }

    /// Final URL for a persisted record: `{bucket}/{id}_{fileName}`
    pub fn final_url(bucket: &str, id: RecordId, file_name: &str) -> String {
        format!("{bucket}/{}", Self::storage_name(id, file_name))
    }

    /// Provisional URL used before an identity exists: `{bucket}/{fileName}`
    pub fn provisional_url(bucket: &str, file_name: &str) -> String {
        format!("{bucket}/{file_name}")
    }

    /// Whether the URL already reflects the assigned identity
    pub fn url_is_final(&self, bucket: &str) -> bool {
        match self.id {
            Some(id) => self.url == Self::final_url(bucket, id, &self.design.file_name),
            None => false,
        }
    }
}

/// Quote record as stored in the catalog and published in snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub id: RecordId,
    pub text: String,
    pub tags: Vec<String>,
    pub lang: String,
}

/// Quote awaiting persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuote {
    pub text: String,
    pub tags: Vec<String>,
    pub lang: String,
}

impl NewQuote {
    pub fn with_id(self, id: RecordId) -> QuoteRecord {
        QuoteRecord {
            id,
            text: self.text,
            tags: self.tags,
            lang: self.lang,
        }
    }
}

/// Collection types that get their own published snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Media,
    Quotes,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Media => "media",
            Self::Quotes => "quotes",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "media" | "image" | "images" => Ok(Self::Media),
            "quotes" | "quote" => Ok(Self::Quotes),
            other => Err(format!("unknown collection: {other}")),
        }
    }
}

/// Summary block of a published snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub total: usize,
    pub url: String,
}

/// Published media snapshot document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSnapshot {
    pub media: Vec<MediaRecord>,
    pub metadata: SnapshotSummary,
}

/// Published quote snapshot document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub quotes: Vec<QuoteRecord>,
    pub metadata: SnapshotSummary,
}

/// Aggregate result of a file batch import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub success_count: usize,
    pub failure_count: usize,
}

impl BatchOutcome {
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
    }

    /// Items considered, excluding skipped directories
    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub fn report(&self) -> BatchReport {
        BatchReport {
            success_count: self.success_count,
            failure_count: self.failure_count,
            total: self.total(),
        }
    }
}

/// Batch import payload returned to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub total: usize,
}

/// Result of a spreadsheet import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetImportReport {
    pub rows_read: usize,
    pub quotes_persisted: usize,
    pub chunks: usize,
}

/// Single upload payload returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub id: RecordId,
    pub file_name: String,
}
