//! Persistent document store
//!
//! Scanners talk to storage only through [`DocumentStore`]. Documents are
//! JSON values grouped in named collections and addressed by key. Two
//! backends ship with the crate: an in-memory map and a directory of JSON
//! files.

mod error;
mod file;
mod memory;

pub use error::{StoreError, StoreResult};
pub use file::JsonFileStore;
pub use memory::MemoryStore;

use serde_json::Value;

/// Collection holding evolution checkpoints
pub const EVOLUTION: &str = "evolution";
/// Collection holding CI build records
pub const CI_BUILD: &str = "ci_build";
/// Collection holding CI queue snapshots
pub const CI_QUEUE: &str = "ci_queue";
/// Collection holding host source documents and their step records
pub const SOURCE: &str = "source";

/// Key/document storage consumed by the scanners
///
/// Implementations must make each single-key write atomic. No cross-key
/// transactions are required.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Whether a document exists under `key`
    async fn exists(&self, collection: &str, key: &str) -> StoreResult<bool>;

    /// Fetch the document under `key`, `None` when absent
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Value>>;

    /// Write a document under an explicit key
    async fn index(&self, collection: &str, key: &str, document: Value) -> StoreResult<()>;

    /// Upsert a document keyed by its embedded `id` field
    async fn append(&self, collection: &str, document: Value) -> StoreResult<()> {
        let key = document_id(&document)?;
        self.index(collection, &key, document).await
    }
}

/// Extract the embedded `id` of a document
pub fn document_id(document: &Value) -> StoreResult<String> {
    match document.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        _ => Err(StoreError::MissingId),
    }
}
