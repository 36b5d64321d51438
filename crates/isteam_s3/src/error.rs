use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Object not modified: {key}")]
    NotModified { key: String },

    #[error("Corrupt image metadata on {key}: {source}")]
    CorruptMetadata {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize image metadata: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Object store {operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Batch delete failed for {failed} object(s), first {first_key}: {message}")]
    PartialDelete {
        failed: usize,
        first_key: String,
        message: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        StorageError::Backend {
            operation,
            source: source.into(),
        }
    }

    /// HTTP-equivalent status for the conditions callers branch on.
    pub fn status(&self) -> Option<u16> {
        match self {
            StorageError::NotFound { .. } => Some(404),
            StorageError::NotModified { .. } => Some(304),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    pub fn is_not_modified(&self) -> bool {
        matches!(self, StorageError::NotModified { .. })
    }

    /// Label used for the `outcome` metric dimension.
    pub(crate) fn outcome(&self) -> &'static str {
        match self {
            StorageError::NotFound { .. } => "not_found",
            StorageError::NotModified { .. } => "not_modified",
            _ => "error",
        }
    }
}
