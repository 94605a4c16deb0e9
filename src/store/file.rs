//! Directory-backed JSON document store

use super::{DocumentStore, StoreError, StoreResult};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// One JSON file per document at `<root>/<collection>/<key>.json`
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// reader never observes a half-written document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, collection: &str, key: &str) -> StoreResult<PathBuf> {
        validate_name(collection)?;
        Ok(self
            .root
            .join(collection)
            .join(format!("{}.json", file_stem(key)?)))
    }
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

// Collection names become directories and are never encoded
fn validate_name(name: &str) -> StoreResult<()> {
    if !name.is_empty() && !name.starts_with('.') && name.chars().all(is_safe_char) {
        Ok(())
    } else {
        Err(StoreError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// File name for a document key
///
/// Safe keys are used as they are. Any other byte, and a leading dot, is
/// written as `%XX`. Safe keys never contain `%`, so distinct keys always
/// map to distinct files.
fn file_stem(key: &str) -> StoreResult<String> {
    if key.is_empty() {
        return Err(StoreError::InvalidName {
            name: key.to_string(),
        });
    }
    let mut stem = String::with_capacity(key.len());
    for (index, byte) in key.bytes().enumerate() {
        let c = byte as char;
        if byte.is_ascii() && is_safe_char(c) && !(index == 0 && c == '.') {
            stem.push(c);
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    Ok(stem)
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait::async_trait]
impl DocumentStore for JsonFileStore {
    async fn exists(&self, collection: &str, key: &str) -> StoreResult<bool> {
        let path = self.document_path(collection, key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_error(&path, e))
    }

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Value>> {
        let path = self.document_path(collection, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn index(&self, collection: &str, key: &str, document: Value) -> StoreResult<()> {
        let path = self.document_path(collection, key)?;
        let dir = self.root.join(collection);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;

        let bytes = serde_json::to_vec_pretty(&document)?;
        let tmp = dir.join(format!(".{}.tmp", file_stem(key)?));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&path, e))?;

        log::trace!("Stored {}/{}", collection, key);
        Ok(())
    }
}
