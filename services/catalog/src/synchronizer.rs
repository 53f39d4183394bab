//! Metadata snapshot publishing.
//!
//! A snapshot is the whole collection plus a summary block, written as pretty
//! JSON to a local staging path and then uploaded under a fixed object key.
//! Every publish recomputes from the catalog store, so repeated publishes
//! converge on the same document apart from `lastUpdated`.

use crate::catalog_store::CatalogStore;
use crate::config::{MetadataConfig, SnapshotConfig};
use crate::error::{IngestError, Result};
use crate::models::{Collection, MediaSnapshot, QuoteSnapshot, SnapshotSummary};
use crate::object_store::ObjectStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

const SNAPSHOT_CONTENT_TYPE: &str = "application/json";

/// Summary blocks of both published collections
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSummaries {
    pub media: SnapshotSummary,
    pub quotes: SnapshotSummary,
}

#[derive(Deserialize)]
struct StagedSnapshot {
    metadata: SnapshotSummary,
}

/// Publishes collection snapshots
pub struct MetadataSynchronizer {
    catalog: Arc<dyn CatalogStore>,
    objects: Arc<dyn ObjectStore>,
    config: MetadataConfig,
}

impl MetadataSynchronizer {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        objects: Arc<dyn ObjectStore>,
        config: MetadataConfig,
    ) -> Self {
        Self {
            catalog,
            objects,
            config,
        }
    }

    fn settings(&self, collection: Collection) -> &SnapshotConfig {
        match collection {
            Collection::Media => &self.config.media,
            Collection::Quotes => &self.config.quotes,
        }
    }

    /// Recompute and publish the snapshot of `collection`
    #[instrument(skip(self), fields(collection = %collection))]
    pub async fn publish(&self, collection: Collection) -> Result<SnapshotSummary> {
        let settings = self.settings(collection);
        let (body, summary) = self.render(collection, settings).await?;

        if let Some(parent) = settings.staging_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    IngestError::publish(collection, format!("{}: {e}", parent.display()))
                })?;
            }
        }

        tokio::fs::write(&settings.staging_path, &body)
            .await
            .map_err(|e| {
                IngestError::publish(
                    collection,
                    format!("staging write to {}: {e}", settings.staging_path.display()),
                )
            })?;

        self.objects
            .put_object(&settings.object_key, body, SNAPSHOT_CONTENT_TYPE)
            .await
            .map_err(|e| IngestError::publish(collection, e))?;

        metrics::counter!("catalog.snapshots.published", "collection" => collection.as_str())
            .increment(1);
        info!(
            total = summary.total,
            object_key = %settings.object_key,
            "Snapshot published"
        );

        Ok(summary)
    }

    async fn render(
        &self,
        collection: Collection,
        settings: &SnapshotConfig,
    ) -> Result<(Vec<u8>, SnapshotSummary)> {
        let summary = |total| SnapshotSummary {
            version: settings.version.clone(),
            last_updated: Utc::now(),
            total,
            url: settings.url.clone(),
        };

        let body = match collection {
            Collection::Media => {
                let media = self.catalog.list_media_records().await?;
                let metadata = summary(media.len());
                serde_json::to_vec_pretty(&MediaSnapshot { media, metadata })
            }
            Collection::Quotes => {
                let quotes = self.catalog.list_quotes().await?;
                let metadata = summary(quotes.len());
                serde_json::to_vec_pretty(&QuoteSnapshot { quotes, metadata })
            }
        }
        .map_err(|e| IngestError::publish(collection, e))?;

        let metadata = parse_summary(collection, &body)?;
        Ok((body, metadata))
    }

    /// Summary block of the last staged snapshot of `collection`
    pub async fn read_summary(&self, collection: Collection) -> Result<SnapshotSummary> {
        read_staged_summary(collection, self.settings(collection)).await
    }

    /// Summary blocks of both collections
    pub async fn summaries(&self) -> Result<SnapshotSummaries> {
        staged_summaries(&self.config).await
    }
}

/// Summary block of a staged snapshot, read without touching either store
pub async fn read_staged_summary(
    collection: Collection,
    settings: &SnapshotConfig,
) -> Result<SnapshotSummary> {
    let path = &settings.staging_path;
    let body = tokio::fs::read(path)
        .await
        .map_err(|e| IngestError::source_read(path.display().to_string(), e))?;

    parse_summary(collection, &body)
}

/// Summary blocks of both staged snapshots; a missing file is an error
pub async fn staged_summaries(config: &MetadataConfig) -> Result<SnapshotSummaries> {
    Ok(SnapshotSummaries {
        media: read_staged_summary(Collection::Media, &config.media).await?,
        quotes: read_staged_summary(Collection::Quotes, &config.quotes).await?,
    })
}

fn parse_summary(collection: Collection, body: &[u8]) -> Result<SnapshotSummary> {
    serde_json::from_slice::<StagedSnapshot>(body)
        .map(|staged| staged.metadata)
        .map_err(|e| IngestError::publish(collection, format!("malformed snapshot: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::MockCatalogStore;
    use crate::models::QuoteRecord;
    use crate::object_store::MockObjectStore;
    use std::path::Path;
    use std::sync::Mutex;

    fn config(dir: &Path) -> MetadataConfig {
        MetadataConfig {
            media: SnapshotConfig {
                version: "1".to_string(),
                url: "https://cdn.example.com/imagesMetadata.json".to_string(),
                staging_path: dir.join("metadata/imagesMetadata.json"),
                object_key: "imagesMetadata.json".to_string(),
            },
            quotes: SnapshotConfig {
                version: "1".to_string(),
                url: "https://cdn.example.com/quotesMetadata.json".to_string(),
                staging_path: dir.join("metadata/quotesMetadata.json"),
                object_key: "quotesMetadata.json".to_string(),
            },
        }
    }

    fn quotes() -> Vec<QuoteRecord> {
        vec![
            QuoteRecord {
                id: 1,
                text: "Know thyself".to_string(),
                tags: vec!["wisdom".to_string()],
                lang: "en-US".to_string(),
            },
            QuoteRecord {
                id: 2,
                text: "Carpe diem".to_string(),
                tags: vec![],
                lang: "en-US".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_publish_stages_and_uploads_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let uploaded = Arc::new(Mutex::new(Vec::new()));

        let mut catalog = MockCatalogStore::new();
        catalog.expect_list_quotes().returning(|| Ok(quotes()));
        let mut objects = MockObjectStore::new();
        let sink = uploaded.clone();
        objects
            .expect_put_object()
            .withf(|key, _, content_type| key == "quotesMetadata.json" && content_type == "application/json")
            .times(1)
            .returning(move |_, body, _| {
                *sink.lock().unwrap() = body;
                Ok(())
            });

        let sync = MetadataSynchronizer::new(Arc::new(catalog), Arc::new(objects), config(dir.path()));
        let summary = sync.publish(Collection::Quotes).await.unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.version, "1");
        assert_eq!(summary.url, "https://cdn.example.com/quotesMetadata.json");

        let staged = std::fs::read(dir.path().join("metadata/quotesMetadata.json")).unwrap();
        assert_eq!(staged, *uploaded.lock().unwrap());

        let doc: serde_json::Value = serde_json::from_slice(&staged).unwrap();
        assert_eq!(doc["quotes"].as_array().unwrap().len(), 2);
        assert_eq!(doc["metadata"]["total"], 2);
        assert!(doc["metadata"]["lastUpdated"].is_string());
    }

    #[tokio::test]
    async fn test_republish_is_stable_apart_from_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalogStore::new();
        catalog.expect_list_quotes().times(2).returning(|| Ok(quotes()));
        let mut objects = MockObjectStore::new();
        objects.expect_put_object().times(2).returning(|_, _, _| Ok(()));

        let sync = MetadataSynchronizer::new(Arc::new(catalog), Arc::new(objects), config(dir.path()));
        let path = dir.path().join("metadata/quotesMetadata.json");

        let first = sync.publish(Collection::Quotes).await.unwrap();
        let first_doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let second = sync.publish(Collection::Quotes).await.unwrap();
        let second_doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();

        assert_eq!(first.total, second.total);
        assert_eq!(first_doc["quotes"], second_doc["quotes"]);
        assert!(second.last_updated >= first.last_updated);
    }

    #[tokio::test]
    async fn test_empty_collection_publishes_zero_total() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalogStore::new();
        catalog.expect_list_media_records().returning(|| Ok(vec![]));
        let mut objects = MockObjectStore::new();
        objects.expect_put_object().returning(|_, _, _| Ok(()));

        let sync = MetadataSynchronizer::new(Arc::new(catalog), Arc::new(objects), config(dir.path()));
        let summary = sync.publish(Collection::Media).await.unwrap();

        assert_eq!(summary.total, 0);
        assert_eq!(sync.read_summary(Collection::Media).await.unwrap(), summary);
    }

    #[tokio::test]
    async fn test_upload_failure_is_publish_error_and_keeps_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalogStore::new();
        catalog.expect_list_quotes().returning(|| Ok(quotes()));
        let mut objects = MockObjectStore::new();
        objects
            .expect_put_object()
            .returning(|key, _, _| Err(IngestError::storage("put_object", key, anyhow::anyhow!("503"))));

        let sync = MetadataSynchronizer::new(Arc::new(catalog), Arc::new(objects), config(dir.path()));
        let err = sync.publish(Collection::Quotes).await.unwrap_err();

        assert!(matches!(err, IngestError::Publish { .. }));
        assert!(dir.path().join("metadata/quotesMetadata.json").exists());
    }

    #[tokio::test]
    async fn test_staging_failure_skips_upload() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the staging directory should be
        std::fs::write(dir.path().join("metadata"), b"occupied").unwrap();

        let mut catalog = MockCatalogStore::new();
        catalog.expect_list_quotes().returning(|| Ok(quotes()));
        let mut objects = MockObjectStore::new();
        objects.expect_put_object().never();

        let sync = MetadataSynchronizer::new(Arc::new(catalog), Arc::new(objects), config(dir.path()));
        let err = sync.publish(Collection::Quotes).await.unwrap_err();

        assert!(matches!(err, IngestError::Publish { .. }));
    }

    #[tokio::test]
    async fn test_summaries_require_both_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalogStore::new();
        catalog.expect_list_quotes().returning(|| Ok(quotes()));
        let mut objects = MockObjectStore::new();
        objects.expect_put_object().returning(|_, _, _| Ok(()));

        let sync = MetadataSynchronizer::new(Arc::new(catalog), Arc::new(objects), config(dir.path()));
        sync.publish(Collection::Quotes).await.unwrap();

        assert_eq!(sync.read_summary(Collection::Quotes).await.unwrap().total, 2);
        let err = sync.summaries().await.unwrap_err();
        assert!(matches!(err, IngestError::SourceRead { .. }));
    }
}
