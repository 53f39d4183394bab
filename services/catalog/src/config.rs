use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Main configuration for the catalog service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// S3 configuration
    pub s3: S3Config,
    /// Ingestion configuration
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Published snapshot configuration
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Spreadsheet source configuration
    #[serde(default)]
    pub sheets: SheetsConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (json, pretty)
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Prometheus exporter port, disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Run migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// S3 storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Bucket holding raw assets and published snapshots
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
    /// Static access key, falls back to the default provider chain when unset
    pub access_key_id: Option<String>,
    /// Static secret key
    pub secret_access_key: Option<String>,
    /// Optional session token
    pub session_token: Option<String>,
    /// Key prefix for raw image objects
    #[serde(default = "default_images_prefix")]
    pub images_prefix: String,
    /// Per-operation timeout in seconds
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
    /// Multipart upload threshold in bytes (5MB default)
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_bytes: usize,
    /// Part size for multipart uploads in bytes (5MB default)
    #[serde(default = "default_part_size")]
    pub part_size_bytes: usize,
    /// Concurrent existence checks during reconciliation
    #[serde(default = "default_reconcile_concurrency")]
    pub reconcile_concurrency: usize,
}

/// Ingestion configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Directory scanned by `import-dir` when no directory is given
    #[serde(default)]
    pub import_dir: Option<PathBuf>,
    /// Language tag assigned to ingested records
    #[serde(default = "default_lang")]
    pub default_lang: String,
    /// Maximum single upload size in megabytes
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

/// Snapshot settings for one collection
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Version tag written into the summary
    pub version: String,
    /// Public URL the snapshot is served from
    pub url: String,
    /// Local staging path for the serialized document
    pub staging_path: PathBuf,
    /// Object key the document is uploaded under
    pub object_key: String,
}

/// Published snapshot configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "MetadataSource")]
pub struct MetadataConfig {
    pub media: SnapshotConfig,
    pub quotes: SnapshotConfig,
}

/// Snapshot block as layered from files and environment; any key left out
/// falls back to the per-collection default
#[derive(Debug, Default, Deserialize)]
struct SnapshotSource {
    version: Option<String>,
    url: Option<String>,
    staging_path: Option<PathBuf>,
    object_key: Option<String>,
}

impl SnapshotSource {
    fn over(self, defaults: SnapshotConfig) -> SnapshotConfig {
        SnapshotConfig {
            version: self.version.unwrap_or(defaults.version),
            url: self.url.unwrap_or(defaults.url),
            staging_path: self.staging_path.unwrap_or(defaults.staging_path),
            object_key: self.object_key.unwrap_or(defaults.object_key),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct MetadataSource {
    #[serde(default)]
    media: SnapshotSource,
    #[serde(default)]
    quotes: SnapshotSource,
}

impl From<MetadataSource> for MetadataConfig {
    fn from(source: MetadataSource) -> Self {
        Self {
            media: source.media.over(default_media_snapshot()),
            quotes: source.quotes.over(default_quotes_snapshot()),
        }
    }
}

/// Spreadsheet source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
    /// Sheets API base URL
    #[serde(default = "default_sheets_api_base")]
    pub api_base_url: String,
    /// API key for the values endpoint
    #[serde(default)]
    pub api_key: Option<String>,
    /// Range read from the sheet (sheet name or A1 notation)
    #[serde(default = "default_sheets_range")]
    pub range: String,
    /// Rows persisted per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pattern a spreadsheet link must match
    #[serde(default = "default_link_pattern")]
    pub link_pattern: String,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// Default value functions
fn default_service_name() -> String {
    "catalog-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_images_prefix() -> String {
    "images/".to_string()
}

fn default_operation_timeout_secs() -> u64 {
    30
}

fn default_multipart_threshold() -> usize {
    5 * 1024 * 1024 // 5MB
}

fn default_part_size() -> usize {
    5 * 1024 * 1024 // 5MB
}

fn default_reconcile_concurrency() -> usize {
    8
}

fn default_lang() -> String {
    "en-US".to_string()
}

fn default_max_upload_mb() -> u64 {
    10
}

fn default_snapshot_version() -> String {
    "1".to_string()
}

fn default_media_snapshot() -> SnapshotConfig {
    SnapshotConfig {
        version: default_snapshot_version(),
        url: String::new(),
        staging_path: PathBuf::from("metadata/imagesMetadata.json"),
        object_key: "imagesMetadata.json".to_string(),
    }
}

fn default_quotes_snapshot() -> SnapshotConfig {
    SnapshotConfig {
        version: default_snapshot_version(),
        url: String::new(),
        staging_path: PathBuf::from("metadata/quotesMetadata.json"),
        object_key: "quotesMetadata.json".to_string(),
    }
}

fn default_sheets_api_base() -> String {
    "https://sheets.googleapis.com/v4/spreadsheets".to_string()
}

fn default_sheets_range() -> String {
    "English".to_string()
}

fn default_chunk_size() -> usize {
    100
}

fn default_link_pattern() -> String {
    r"^https://docs\.google\.com/spreadsheets/d/[a-zA-Z0-9_-]+/edit[^/]*$".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("service.name", "catalog-service")?
            .set_default("service.log_level", "info")?
            // Add config file if present
            .add_source(config::File::with_name("config/catalog").required(false))
            .add_source(config::File::with_name("/etc/content/catalog").required(false))
            // Override with environment variables
            // CATALOG__S3__BUCKET -> s3.bucket
            .add_source(
                config::Environment::with_prefix("CATALOG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::MissingRequired("database.url".to_string()));
        }

        if self.s3.bucket.is_empty() {
            return Err(ConfigError::MissingRequired("s3.bucket".to_string()));
        }

        if self.sheets.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sheets.chunk_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.s3.reconcile_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "s3.reconcile_concurrency".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        for (name, snapshot) in [("media", &self.metadata.media), ("quotes", &self.metadata.quotes)] {
            if snapshot.object_key.is_empty() {
                return Err(ConfigError::MissingRequired(format!(
                    "metadata.{name}.object_key"
                )));
            }
        }

        if let Err(e) = regex::Regex::new(&self.sheets.link_pattern) {
            return Err(ConfigError::InvalidValue {
                field: "sheets.link_pattern".to_string(),
                reason: e.to_string(),
            });
        }

        Ok(())
    }

    /// Maximum single upload size in bytes
    pub fn max_upload_bytes(&self) -> u64 {
        self.ingest.max_upload_mb << 20
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_port: None,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            import_dir: None,
            default_lang: default_lang(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            media: default_media_snapshot(),
            quotes: default_quotes_snapshot(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_sheets_api_base(),
            api_key: None,
            range: default_sheets_range(),
            chunk_size: default_chunk_size(),
            link_pattern: default_link_pattern(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> Config {
        let raw = config::Config::builder()
            .set_default("database.url", "postgres://localhost/catalog")
            .unwrap()
            .set_default("s3.bucket", "flyers")
            .unwrap()
            .build()
            .unwrap();
        raw.try_deserialize().unwrap()
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_chunk_size(), 100);
        assert_eq!(default_max_upload_mb(), 10);
        assert_eq!(default_lang(), "en-US");
        assert_eq!(default_images_prefix(), "images/");
    }

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config = minimal_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.service.name, "catalog-service");
        assert_eq!(config.sheets.chunk_size, 100);
        assert_eq!(config.metadata.media.object_key, "imagesMetadata.json");
        assert_eq!(config.metadata.quotes.object_key, "quotesMetadata.json");
        assert_eq!(config.max_upload_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.metadata.quotes.version, "1");
    }

    #[test]
    fn test_snapshot_url_override_keeps_other_defaults() {
        let raw = config::Config::builder()
            .set_default("database.url", "postgres://localhost/catalog")
            .unwrap()
            .set_default("s3.bucket", "flyers")
            .unwrap()
            .set_override("metadata.media.url", "https://cdn.example.com/imagesMetadata.json")
            .unwrap()
            .build()
            .unwrap();
        let config: Config = raw.try_deserialize().unwrap();

        assert_eq!(
            config.metadata.media.url,
            "https://cdn.example.com/imagesMetadata.json"
        );
        assert_eq!(config.metadata.media.object_key, "imagesMetadata.json");
        assert_eq!(
            config.metadata.media.staging_path,
            PathBuf::from("metadata/imagesMetadata.json")
        );
        assert_eq!(config.metadata.media.version, "1");
        assert_eq!(config.metadata.quotes.object_key, "quotesMetadata.json");
        assert!(config.metadata.quotes.url.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = minimal_config();
        config.sheets.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_bucket() {
        let mut config = minimal_config();
        config.s3.bucket.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(field)) if field == "s3.bucket"
        ));
    }
}
