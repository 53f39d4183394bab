//! Error taxonomy for the ingestion pipeline.
//!
//! Every pipeline step maps its failure onto one of these variants. Item-level
//! variants are counted by the batch importer; the rest abort a command.

use thiserror::Error;

/// Errors that can occur while ingesting, persisting or publishing records
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported media {file_name}: {reason}")]
    UnsupportedMedia { file_name: String, reason: String },

    #[error("Catalog store {operation} failed: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Object store {operation} failed for key {key}: {source}")]
    Storage {
        operation: &'static str,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to read source {source_name}: {reason}")]
    SourceRead { source_name: String, reason: String },

    #[error("Failed to publish {collection} snapshot: {reason}")]
    Publish { collection: String, reason: String },

    #[error("Invalid submission: {0}")]
    Validation(String),
}

impl IngestError {
    pub fn unsupported(file_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::UnsupportedMedia {
            file_name: file_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(operation: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Persistence {
            operation,
            source: source.into(),
        }
    }

    pub fn storage(
        operation: &'static str,
        key: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Storage {
            operation,
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn source_read(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceRead {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn publish(collection: impl ToString, reason: impl ToString) -> Self {
        Self::Publish {
            collection: collection.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable code for logs and metrics labels
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedMedia { .. } => "unsupported_media",
            Self::Persistence { .. } => "persistence",
            Self::Storage { .. } => "storage",
            Self::SourceRead { .. } => "source_read",
            Self::Publish { .. } => "publish",
            Self::Validation(_) => "validation",
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(IngestError::unsupported("a.bmp", "unknown encoding").code(), "unsupported_media");
        assert_eq!(
            IngestError::persistence("create", anyhow::anyhow!("down")).code(),
            "persistence"
        );
        assert_eq!(IngestError::source_read("/data/designs", "not found").code(), "source_read");
        assert_eq!(IngestError::publish("media", "upload failed").code(), "publish");
        assert_eq!(IngestError::Validation("missing text".to_string()).code(), "validation");
    }

    #[test]
    fn test_error_display() {
        let err = IngestError::storage("put_object", "images/7_a.png", anyhow::anyhow!("503"));
        assert_eq!(
            err.to_string(),
            "Object store put_object failed for key images/7_a.png: 503"
        );
        assert_eq!(err.code(), "storage");
    }
}
