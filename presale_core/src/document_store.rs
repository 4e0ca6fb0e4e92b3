// Document store abstraction - per-user documents addressed by slash paths
// (`users/{uid}/transactions/{hash}`). Native uses JSON files, tests use memory.

use crate::error::CoreError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Result type for storage operations
pub type StoreResult<T> = Result<T, CoreError>;

/// Abstract document store.
/// Writes use merge semantics: top-level fields of `fields` overwrite, nested
/// objects merge recursively, fields not mentioned are kept.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the document or merge `fields` into it
    async fn merge(&self, path: &str, fields: Value) -> StoreResult<()>;

    /// Load a document
    async fn get(&self, path: &str) -> StoreResult<Option<Value>>;

    /// Documents directly under `collection`, in no particular order
    async fn list(&self, collection: &str) -> StoreResult<Vec<Value>>;

    /// Check if a document exists
    async fn exists(&self, path: &str) -> StoreResult<bool> {
        Ok(self.get(path).await?.is_some())
    }
}

/// Paths used by the purchase flow
pub mod paths {
    pub fn user_transactions(uid: &str) -> String {
        format!("users/{}/transactions", uid)
    }

    pub fn user_transaction(uid: &str, hash: &str) -> String {
        format!("users/{}/transactions/{}", uid, hash)
    }

    /// Invitees registered under `uid`
    pub fn user_referrals(uid: &str) -> String {
        format!("users/{}/referral", uid)
    }

    pub fn user_referral(uid: &str, invitee: &str) -> String {
        format!("users/{}/referral/{}", uid, invitee)
    }
}

/// Split and check a path. Document paths have an even number of segments,
/// collection paths an odd number.
pub fn path_segments(path: &str, document: bool) -> StoreResult<Vec<&str>> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.iter().any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\\')) {
        return Err(CoreError::InvalidInput(format!("malformed store path: {:?}", path)));
    }
    let even = segments.len() % 2 == 0;
    if even != document {
        let expected = if document { "document" } else { "collection" };
        return Err(CoreError::InvalidInput(format!("{:?} is not a {} path", path, expected)));
    }
    Ok(segments)
}

/// Merge `fields` into `target` in place.
pub fn merge_value(target: &mut Value, fields: Value) {
    match (target, fields) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                let nested = value.is_object() && existing.get(&key).map_or(false, Value::is_object);
                if nested {
                    if let Some(slot) = existing.get_mut(&key) {
                        merge_value(slot, value);
                    }
                } else {
                    existing.insert(key, value);
                }
            }
        }
        (target, fields) => *target = fields,
    }
}

fn require_object(path: &str, fields: &Value) -> StoreResult<()> {
    if fields.is_object() {
        Ok(())
    } else {
        Err(CoreError::InvalidInput(format!("document body for {} must be an object", path)))
    }
}

/// In-process store. Backs tests and sessions that run without a user
/// directory configured.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<BTreeMap<String, Value>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn merge(&self, path: &str, fields: Value) -> StoreResult<()> {
        path_segments(path, true)?;
        require_object(path, &fields)?;
        let mut docs = self.docs.write().await;
        let doc = docs.entry(path.to_string()).or_insert_with(|| Value::Object(Map::new()));
        merge_value(doc, fields);
        Ok(())
    }

    async fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        path_segments(path, true)?;
        Ok(self.docs.read().await.get(path).cloned())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Value>> {
        path_segments(collection, false)?;
        let prefix = format!("{}/", collection);
        let docs = self.docs.read().await;
        Ok(docs
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| !k[prefix.len()..].contains('/'))
            .map(|(_, v)| v.clone())
            .collect())
    }
}
