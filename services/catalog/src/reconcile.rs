//! Out-of-band sweep over media records left `pending` by an interrupted
//! ingestion. A sweep that changes any record republishes the media snapshot.

use crate::catalog_store::CatalogStore;
use crate::error::Result;
use crate::models::{Collection, MediaRecord, RecordStatus};
use crate::object_store::{image_key, ObjectStore};
use crate::synchronizer::MetadataSynchronizer;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Counts produced by one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub scanned: usize,
    pub urls_repaired: usize,
    pub finalized: usize,
    pub orphaned: usize,
    /// Whether the media snapshot was republished after the sweep
    pub republished: bool,
}

enum Verdict {
    Finalized { url_repaired: bool },
    Orphaned { url_repaired: bool },
}

pub struct Reconciler {
    catalog: Arc<dyn CatalogStore>,
    objects: Arc<dyn ObjectStore>,
    synchronizer: Arc<MetadataSynchronizer>,
    bucket: String,
    images_prefix: String,
    concurrency: usize,
}

impl Reconciler {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        objects: Arc<dyn ObjectStore>,
        synchronizer: Arc<MetadataSynchronizer>,
        bucket: impl Into<String>,
        images_prefix: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            catalog,
            objects,
            synchronizer,
            bucket: bucket.into(),
            images_prefix: images_prefix.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Repair or report every pending record. The first store error aborts
    /// the sweep; records already repaired stay repaired.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let pending = self.catalog.list_pending_media_records().await?;
        let mut report = ReconcileReport {
            scanned: pending.len(),
            ..ReconcileReport::default()
        };

        let mut verdicts = stream::iter(pending)
            .map(|record| self.settle(record))
            .buffer_unordered(self.concurrency);

        while let Some(verdict) = verdicts.next().await {
            let url_repaired = match verdict? {
                Verdict::Finalized { url_repaired } => {
                    report.finalized += 1;
                    url_repaired
                }
                Verdict::Orphaned { url_repaired } => {
                    report.orphaned += 1;
                    url_repaired
                }
            };
            if url_repaired {
                report.urls_repaired += 1;
            }
        }

        if report.urls_repaired > 0 || report.finalized > 0 {
            self.synchronizer.publish(Collection::Media).await?;
            report.republished = true;
        }

        info!(
            republished = report.republished,
            scanned = report.scanned,
            urls_repaired = report.urls_repaired,
            finalized = report.finalized,
            orphaned = report.orphaned,
            "Reconciliation complete"
        );
        Ok(report)
    }

    async fn settle(&self, mut record: MediaRecord) -> Result<Verdict> {
        let Some(id) = record.id else {
            return Ok(Verdict::Orphaned { url_repaired: false });
        };

        let url_repaired = !record.url_is_final(&self.bucket);
        if url_repaired {
            record.url = MediaRecord::final_url(&self.bucket, id, &record.design.file_name);
        }

        let key = image_key(
            &self.images_prefix,
            &MediaRecord::storage_name(id, &record.design.file_name),
        );
        let stored = self.objects.object_exists(&key).await?;

        if stored {
            record.status = RecordStatus::Finalized;
        }
        if stored || url_repaired {
            self.catalog.update_media_record(&record).await?;
        }

        if stored {
            Ok(Verdict::Finalized { url_repaired })
        } else {
            warn!(record_id = id, s3_key = %key, "Pending record has no stored asset");
            Ok(Verdict::Orphaned { url_repaired })
        }
    }
}
