// Transaction ledger - best-effort mirror of confirmed transactions in the
// user's document store. The chain stays the source of truth.

use crate::document_store::{paths, DocumentStore, StoreResult};
use crate::models::TransactionRecord;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// What happened to a confirmed transaction handed to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Written,
    /// Hash already seen by this writer; nothing was written.
    Duplicate,
    /// No signed-in user to scope the write to.
    Skipped,
    /// The store rejected the write. Logged, never retried.
    Failed,
}

pub struct LedgerWriter {
    store: Arc<dyn DocumentStore>,
    uid: Option<String>,
    recorded: Mutex<HashSet<String>>,
    last_success: RwLock<Option<TransactionRecord>>,
}

impl LedgerWriter {
    pub fn new(store: Arc<dyn DocumentStore>, uid: Option<String>) -> Self {
        Self {
            store,
            uid: uid.filter(|u| !u.trim().is_empty()),
            recorded: Mutex::new(HashSet::new()),
            last_success: RwLock::new(None),
        }
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    /// Most recent confirmed transaction observed in this session.
    pub async fn last_success(&self) -> Option<TransactionRecord> {
        self.last_success.read().await.clone()
    }

    /// Record a confirmed transaction once per hash.
    ///
    /// The in-memory summary is updated on first observation regardless of
    /// whether the store write succeeds. Repeat calls for the same hash are
    /// no-ops here, and the store write itself is a merge keyed by hash, so
    /// another writer racing on the same hash converges on one document.
    pub async fn record_confirmed(&self, record: TransactionRecord) -> RecordOutcome {
        {
            let mut recorded = self.recorded.lock().await;
            if !recorded.insert(record.hash.clone()) {
                debug!("Transaction {} already recorded, skipping", record.hash);
                return RecordOutcome::Duplicate;
            }
        }
        *self.last_success.write().await = Some(record.clone());

        let uid = match &self.uid {
            Some(uid) => uid,
            None => {
                debug!("No signed-in user, transaction {} not written to the ledger", record.hash);
                return RecordOutcome::Skipped;
            }
        };

        let path = paths::user_transaction(uid, &record.hash);
        let fields = match serde_json::to_value(&record) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to serialise ledger record {}: {}", record.hash, e);
                return RecordOutcome::Failed;
            }
        };
        match self.store.merge(&path, fields).await {
            Ok(()) => {
                info!("Recorded {:?} transaction {} for user {}", record.kind, record.hash, uid);
                RecordOutcome::Written
            }
            Err(e) => {
                error!("Failed to write ledger record {}: {}", path, e);
                RecordOutcome::Failed
            }
        }
    }

    /// Newest `limit` records of the signed-in user, by `createdAt` descending.
    pub async fn recent(&self, limit: usize) -> StoreResult<Vec<TransactionRecord>> {
        let uid = match &self.uid {
            Some(uid) => uid,
            None => return Ok(Vec::new()),
        };
        let docs = self.store.list(&paths::user_transactions(uid)).await?;
        let mut records: Vec<TransactionRecord> = docs
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<TransactionRecord>(doc) {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!("Skipping unreadable ledger document: {}", e);
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_store::MemoryDocumentStore;
    use crate::models::{ConfirmedReceipt, TxKind};
    use ethers::types::{Address, H256, U256};

    fn record(byte: u8) -> TransactionRecord {
        let receipt = ConfirmedReceipt {
            hash: H256::repeat_byte(byte),
            block_number: Some(byte as u64),
            gas_used: Some(U256::from(50_000u64)),
            effective_gas_price: None,
            succeeded: true,
        };
        TransactionRecord::confirmed(TxKind::BuyNative, Address::repeat_byte(9), "BNB", "0.1", None, 18, &receipt)
    }

    #[tokio::test]
    async fn same_hash_is_written_once() {
        let store = Arc::new(MemoryDocumentStore::new());
        let ledger = LedgerWriter::new(store.clone(), Some("user-1".into()));

        assert_eq!(ledger.record_confirmed(record(1)).await, RecordOutcome::Written);
        assert_eq!(ledger.record_confirmed(record(1)).await, RecordOutcome::Duplicate);
        assert_eq!(store.len().await, 1);
        assert_eq!(ledger.recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn separate_writers_merge_into_one_document() {
        let store = Arc::new(MemoryDocumentStore::new());
        let a = LedgerWriter::new(store.clone(), Some("user-1".into()));
        let b = LedgerWriter::new(store.clone(), Some("user-1".into()));

        assert_eq!(a.record_confirmed(record(2)).await, RecordOutcome::Written);
        assert_eq!(b.record_confirmed(record(2)).await, RecordOutcome::Written);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn without_user_only_summary_updates() {
        let store = Arc::new(MemoryDocumentStore::new());
        let ledger = LedgerWriter::new(store.clone(), None);

        assert_eq!(ledger.record_confirmed(record(3)).await, RecordOutcome::Skipped);
        assert!(store.is_empty().await);
        assert_eq!(ledger.last_success().await.unwrap().hash, format!("{:?}", H256::repeat_byte(3)));
        assert!(ledger.recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let store = Arc::new(MemoryDocumentStore::new());
        let ledger = LedgerWriter::new(store, Some("user-1".into()));
        for byte in 1..=4u8 {
            let mut r = record(byte);
            r.created_at = r.created_at + chrono::Duration::seconds(byte as i64);
            ledger.record_confirmed(r).await;
        }

        let recent = ledger.recent(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].hash, format!("{:?}", H256::repeat_byte(4)));
        assert_eq!(recent[2].hash, format!("{:?}", H256::repeat_byte(2)));
    }
}
