// Native file-based document store: one pretty-printed JSON file per
// document, directories per collection

use crate::document_store::{merge_value, path_segments, DocumentStore, StoreResult};
use crate::error::CoreError;
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// File-based document store for native (CLI) mode
pub struct FileDocumentStore {
    base_dir: PathBuf,
    // Serialises read-merge-write so two merges into one file can't interleave
    write_lock: Mutex<()>,
}

impl FileDocumentStore {
    /// Create a new store rooted at `base_dir`
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            write_lock: Mutex::new(()),
        }
    }

    fn document_file(&self, path: &str) -> StoreResult<PathBuf> {
        let segments = path_segments(path, true)?;
        let (name, parents) = segments
            .split_last()
            .ok_or_else(|| CoreError::InvalidInput("empty store path".to_string()))?;
        let mut file = self.base_dir.clone();
        for segment in parents {
            file.push(segment);
        }
        file.push(format!("{}.json", name));
        Ok(file)
    }

    fn collection_dir(&self, collection: &str) -> StoreResult<PathBuf> {
        let mut dir = self.base_dir.clone();
        for segment in path_segments(collection, false)? {
            dir.push(segment);
        }
        Ok(dir)
    }

    async fn read_file(file: &Path) -> StoreResult<Option<Value>> {
        if !tokio::fs::try_exists(file).await.unwrap_or(false) {
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(file)
            .await
            .map_err(|e| CoreError::Io(format!("Failed to read file: {}", e)))?;
        let doc = serde_json::from_str(&json)
            .map_err(|e| CoreError::Storage(format!("Corrupt document {:?}: {}", file, e)))?;
        Ok(Some(doc))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn merge(&self, path: &str, fields: Value) -> StoreResult<()> {
        if !fields.is_object() {
            return Err(CoreError::InvalidInput(format!("document body for {} must be an object", path)));
        }
        let file = self.document_file(path)?;
        let _guard = self.write_lock.lock().await;
        debug!("Merging document into {:?}", file);

        let mut doc = Self::read_file(&file).await?.unwrap_or_else(|| Value::Object(Map::new()));
        merge_value(&mut doc, fields);

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::Io(format!("Failed to create directory: {}", e)))?;
        }
        let json = serde_json::to_string_pretty(&doc)?;

        // Write then rename so readers never see a half-written document
        let tmp = file.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CoreError::Io(format!("Failed to write file: {}", e)))?;
        tokio::fs::rename(&tmp, &file)
            .await
            .map_err(|e| CoreError::Io(format!("Failed to replace file: {}", e)))?;
        Ok(())
    }

    async fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        let file = self.document_file(path)?;
        Self::read_file(&file).await
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Value>> {
        let dir = self.collection_dir(collection)?;
        debug!("Listing documents in {:?}", dir);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut docs = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| CoreError::Io(format!("Failed to read directory: {}", e)))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CoreError::Io(format!("Failed to read directory entry: {}", e)))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match Self::read_file(&path).await {
                Ok(Some(doc)) => docs.push(doc),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable document {:?}: {}", path, e),
            }
        }
        debug!("Found {} documents", docs.len());
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_store::paths;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_merge_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(temp_dir.path().to_path_buf());
        let path = paths::user_transaction("uid-1", "0xabc");

        store.merge(&path, json!({"type": "BUY_NATIVE", "status": "success"})).await.unwrap();
        store.merge(&path, json!({"blockNumber": "12"})).await.unwrap();

        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc, json!({"type": "BUY_NATIVE", "status": "success", "blockNumber": "12"}));
        assert!(temp_dir.path().join("users/uid-1/transactions/0xabc.json").exists());
    }

    #[tokio::test]
    async fn test_file_store_list() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(temp_dir.path().to_path_buf());

        assert!(store.list(&paths::user_transactions("uid-1")).await.unwrap().is_empty());
        store.merge(&paths::user_transaction("uid-1", "0x1"), json!({"n": 1})).await.unwrap();
        store.merge(&paths::user_transaction("uid-1", "0x2"), json!({"n": 2})).await.unwrap();
        store.merge(&paths::user_transaction("uid-1", "0x2"), json!({"n": 3})).await.unwrap();

        let docs = store.list(&paths::user_transactions("uid-1")).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(!store.exists("users/uid-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_store_list_skips_corrupt_documents() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(temp_dir.path().to_path_buf());
        store.merge(&paths::user_transaction("uid-1", "0x1"), json!({"n": 1})).await.unwrap();
        std::fs::write(temp_dir.path().join("users/uid-1/transactions/0x2.json"), "{truncated").unwrap();

        let docs = store.list(&paths::user_transactions("uid-1")).await.unwrap();
        assert_eq!(docs, vec![json!({"n": 1})]);
        // A direct read still reports the corruption
        assert!(matches!(
            store.get(&paths::user_transaction("uid-1", "0x2")).await,
            Err(CoreError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_rejects_escaping_paths() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(temp_dir.path().to_path_buf());
        assert!(store.merge("users/../../etc", json!({})).await.is_err());
    }
}
