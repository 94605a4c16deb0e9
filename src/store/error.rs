//! Store Error Types

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document has no string 'id' field")]
    MissingId,

    #[error("Invalid collection or key name: {name}")]
    InvalidName { name: String },

    #[error("Storage IO failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored document is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
