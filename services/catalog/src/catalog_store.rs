use crate::config::DatabaseConfig;
use crate::error::{IngestError, Result};
use crate::models::{
    Design, MediaRecord, NewQuote, Orientation, QuoteRecord, RecordId, RecordStatus, Resolution,
};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Durable relational persistence for media and quote records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert a media record and return the identity assigned to it
    async fn create_media_record(&self, record: &MediaRecord) -> Result<RecordId>;

    /// Overwrite a persisted media record; the record must carry its identity
    async fn update_media_record(&self, record: &MediaRecord) -> Result<()>;

    /// Every media record, ordered by identity
    async fn list_media_records(&self) -> Result<Vec<MediaRecord>>;

    /// Media records still in the `pending` state
    async fn list_pending_media_records(&self) -> Result<Vec<MediaRecord>>;

    /// Insert one chunk of quotes atomically, returning identities in input order
    async fn create_quotes(&self, quotes: &[NewQuote]) -> Result<Vec<RecordId>>;

    /// Every quote record, ordered by identity
    async fn list_quotes(&self) -> Result<Vec<QuoteRecord>>;
}

/// Row shape of the `flyers` table
#[derive(Debug, Clone, FromRow)]
struct FlyerRow {
    id: i64,
    template_id: Option<String>,
    width: i32,
    height: i32,
    unit: i32,
    content_type: String,
    tags: Vec<String>,
    file_format: String,
    orientation: String,
    file_name: String,
    lang: String,
    url: String,
    status: String,
}

impl TryFrom<FlyerRow> for MediaRecord {
    type Error = IngestError;

    fn try_from(row: FlyerRow) -> Result<Self> {
        let orientation: Orientation = row
            .orientation
            .parse()
            .map_err(|e: String| IngestError::persistence("decode_row", anyhow::anyhow!(e)))?;
        let status: RecordStatus = row
            .status
            .parse()
            .map_err(|e: String| IngestError::persistence("decode_row", anyhow::anyhow!(e)))?;

        Ok(MediaRecord {
            id: Some(row.id),
            design: Design {
                template_id: row.template_id,
                resolution: Resolution {
                    width: row.width.max(0) as u32,
                    height: row.height.max(0) as u32,
                    unit: row.unit,
                },
                content_type: row.content_type,
                tags: row.tags,
                file_format: row.file_format,
                orientation,
                file_name: row.file_name,
            },
            lang: row.lang,
            url: row.url,
            status,
        })
    }
}

/// Row shape of the `quotes` table
#[derive(Debug, Clone, FromRow)]
struct QuoteRow {
    id: i64,
    text: String,
    tags: Vec<String>,
    lang: String,
}

impl From<QuoteRow> for QuoteRecord {
    fn from(row: QuoteRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            tags: row.tags,
            lang: row.lang,
        }
    }
}

const FLYER_COLUMNS: &str = r#"
    id, template_id, width, height, unit, content_type, tags,
    file_format, orientation, file_name, lang, url, status
"#;

/// PostgreSQL-backed catalog store
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    /// Create a new catalog store with connection pool
    pub async fn new(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
            .connect(&config.url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to PostgreSQL: {e}"))?;

        info!("Connected to PostgreSQL database");

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;

        info!("Database migrations completed");
        Ok(())
    }

    async fn fetch_flyers(&self, sql: &str, operation: &'static str) -> Result<Vec<MediaRecord>> {
        let rows = sqlx::query_as::<_, FlyerRow>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IngestError::persistence(operation, e))?;

        rows.into_iter().map(MediaRecord::try_from).collect()
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    #[instrument(skip(self, record), fields(file_name = %record.design.file_name))]
    async fn create_media_record(&self, record: &MediaRecord) -> Result<RecordId> {
        let design = &record.design;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO flyers (
                template_id, width, height, unit, content_type, tags,
                file_format, orientation, file_name, lang, url, status
            ) VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9, $10, $11, $12
            )
            RETURNING id
            "#,
        )
        .bind(&design.template_id)
        .bind(design.resolution.width as i32)
        .bind(design.resolution.height as i32)
        .bind(design.resolution.unit)
        .bind(&design.content_type)
        .bind(&design.tags)
        .bind(&design.file_format)
        .bind(design.orientation.as_str())
        .bind(&design.file_name)
        .bind(&record.lang)
        .bind(&record.url)
        .bind(record.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IngestError::persistence("create_media_record", e))?;

        debug!(record_id = id, "Media record created");
        Ok(id)
    }

    #[instrument(skip(self, record), fields(record_id = ?record.id))]
    async fn update_media_record(&self, record: &MediaRecord) -> Result<()> {
        let id = record.id.ok_or_else(|| {
            IngestError::persistence(
                "update_media_record",
                anyhow::anyhow!("record has no identity"),
            )
        })?;
        let design = &record.design;

        let result = sqlx::query(
            r#"
            UPDATE flyers SET
                template_id = $2, width = $3, height = $4, unit = $5,
                content_type = $6, tags = $7, file_format = $8,
                orientation = $9, file_name = $10, lang = $11, url = $12,
                status = $13, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&design.template_id)
        .bind(design.resolution.width as i32)
        .bind(design.resolution.height as i32)
        .bind(design.resolution.unit)
        .bind(&design.content_type)
        .bind(&design.tags)
        .bind(&design.file_format)
        .bind(design.orientation.as_str())
        .bind(&design.file_name)
        .bind(&record.lang)
        .bind(&record.url)
        .bind(record.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::persistence("update_media_record", e))?;

        if result.rows_affected() == 0 {
            return Err(IngestError::persistence(
                "update_media_record",
                anyhow::anyhow!("media record {id} not found"),
            ));
        }

        Ok(())
    }

    async fn list_media_records(&self) -> Result<Vec<MediaRecord>> {
        let sql = format!("SELECT {FLYER_COLUMNS} FROM flyers ORDER BY id ASC");
        self.fetch_flyers(&sql, "list_media_records").await
    }

    async fn list_pending_media_records(&self) -> Result<Vec<MediaRecord>> {
        let sql = format!(
            "SELECT {FLYER_COLUMNS} FROM flyers WHERE status = 'pending' ORDER BY id ASC"
        );
        self.fetch_flyers(&sql, "list_pending_media_records").await
    }

    #[instrument(skip(self, quotes), fields(chunk_len = quotes.len()))]
    async fn create_quotes(&self, quotes: &[NewQuote]) -> Result<Vec<RecordId>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IngestError::persistence("create_quotes", e))?;

        let mut ids = Vec::with_capacity(quotes.len());
        for quote in quotes {
            let (id,): (i64,) = sqlx::query_as(
                r#"
                INSERT INTO quotes (text, tags, lang)
                VALUES ($1, $2, $3)
                RETURNING id
                "#,
            )
            .bind(&quote.text)
            .bind(&quote.tags)
            .bind(&quote.lang)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| IngestError::persistence("create_quotes", e))?;

            ids.push(id);
        }

        tx.commit()
            .await
            .map_err(|e| IngestError::persistence("create_quotes", e))?;

        debug!(inserted = ids.len(), "Quote chunk committed");
        Ok(ids)
    }

    async fn list_quotes(&self) -> Result<Vec<QuoteRecord>> {
        let rows = sqlx::query_as::<_, QuoteRow>(
            r#"
            SELECT id, text, tags, lang
            FROM quotes
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::persistence("list_quotes", e))?;

        Ok(rows.into_iter().map(QuoteRecord::from).collect())
    }
}
