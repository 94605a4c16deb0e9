//! In-memory document store

use super::{DocumentStore, StoreResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Document store kept entirely in memory
///
/// Used when no store path is configured, and by tests. Tracks how many
/// writes it has accepted so callers can verify that a re-run wrote nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of accepted writes since creation
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of documents in a collection
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |documents| documents.len())
    }

    /// Snapshot of every document in a collection, sorted by key
    pub async fn documents(&self, collection: &str) -> Vec<(String, Value)> {
        let collections = self.collections.read().await;
        let mut documents: Vec<(String, Value)> = collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(key, doc)| (key.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default();
        documents.sort_by(|a, b| a.0.cmp(&b.0));
        documents
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn exists(&self, collection: &str, key: &str) -> StoreResult<bool> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .is_some_and(|documents| documents.contains_key(key)))
    }

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|documents| documents.get(key).cloned()))
    }

    async fn index(&self, collection: &str, key: &str, document: Value) -> StoreResult<()> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), document);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
