use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::store::{
    merge_json, DocumentKey, DocumentStore, Precondition, StoreError, Transaction,
    TransactionBody, TransactionDecision,
};

type Documents = HashMap<DocumentKey, Value>;

/// Process-local document store. Commits are serialized behind one lock,
/// which gives every transaction full isolation.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<Documents>,
    operations: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store operations attempted so far, failed ones included.
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    /// Simulate an outage: every operation fails with `Unavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.documents
            .read()
            .await
            .keys()
            .filter(|key| key.collection == collection)
            .count()
    }

    fn begin_operation(&self, operation: &str) -> Result<(), StoreError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            warn!("In-memory store refusing {} while marked unavailable", operation);
            return Err(StoreError::Unavailable(format!("{} rejected", operation)));
        }
        Ok(())
    }
}

enum StagedWrite {
    Create(DocumentKey, Value),
    Merge(DocumentKey, Value),
}

struct MemoryTransaction<'s> {
    snapshot: &'s Documents,
    writes: Vec<StagedWrite>,
}

impl Transaction for MemoryTransaction<'_> {
    fn get(&mut self, key: &DocumentKey) -> Result<Option<Value>, StoreError> {
        Ok(self.snapshot.get(key).cloned())
    }

    fn create(&mut self, key: &DocumentKey, document: Value) {
        self.writes.push(StagedWrite::Create(key.clone(), document));
    }

    fn merge(&mut self, key: &DocumentKey, patch: Value) {
        self.writes.push(StagedWrite::Merge(key.clone(), patch));
    }
}

/// Validate every staged write against the committed documents and return
/// the resulting documents. Nothing is written if any write is rejected.
fn resolve_writes(documents: &Documents, writes: Vec<StagedWrite>) -> Result<Documents, StoreError> {
    let mut pending: Documents = HashMap::new();

    for write in writes {
        match write {
            StagedWrite::Create(key, document) => {
                if documents.contains_key(&key) || pending.contains_key(&key) {
                    return Err(StoreError::AlreadyExists(key));
                }
                pending.insert(key, document);
            }
            StagedWrite::Merge(key, patch) => {
                let mut merged = match pending.remove(&key).or_else(|| documents.get(&key).cloned()) {
                    Some(existing) => existing,
                    None => return Err(StoreError::NotFound(key)),
                };
                merge_json(&mut merged, patch);
                pending.insert(key, merged);
            }
        }
    }

    Ok(pending)
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, key: &DocumentKey) -> Result<Option<Value>, StoreError> {
        self.begin_operation("get")?;
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn set(&self, key: &DocumentKey, document: Value) -> Result<(), StoreError> {
        self.begin_operation("set")?;
        debug!("Setting document {}", key);
        self.documents.write().await.insert(key.clone(), document);
        Ok(())
    }

    async fn merge(&self, key: &DocumentKey, patch: Value) -> Result<(), StoreError> {
        self.begin_operation("merge")?;
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        merge_json(document, patch);
        debug!("Merged patch into {}", key);
        Ok(())
    }

    async fn merge_if(
        &self,
        key: &DocumentKey,
        precondition: &Precondition,
        patch: Value,
    ) -> Result<Value, StoreError> {
        self.begin_operation("merge_if")?;
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        if !precondition.holds_for(document) {
            return Err(StoreError::PreconditionFailed {
                key: key.clone(),
                field: precondition.field.clone(),
                expected: precondition.equals.clone(),
            });
        }

        merge_json(document, patch);
        Ok(document.clone())
    }

    async fn query(
        &self,
        collection: &str,
        field: &str,
        equals: &Value,
    ) -> Result<Vec<Value>, StoreError> {
        self.begin_operation("query")?;
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|(key, document)| key.collection == collection && document.get(field) == Some(equals))
            .map(|(_, document)| document.clone())
            .collect())
    }

    async fn run_transaction<'f>(&self, body: TransactionBody<'f>) -> Result<(), StoreError> {
        self.begin_operation("transaction")?;
        let mut documents = self.documents.write().await;

        let (decision, writes) = {
            let mut tx = MemoryTransaction {
                snapshot: &*documents,
                writes: Vec::new(),
            };
            let decision = body(&mut tx);
            (decision, tx.writes)
        };

        if decision == TransactionDecision::Rollback {
            debug!("Transaction rolled back, {} staged writes discarded", writes.len());
            return Ok(());
        }

        let staged = writes.len();
        let resolved = resolve_writes(&documents, writes)?;
        documents.extend(resolved);
        debug!("Transaction committed {} writes", staged);
        Ok(())
    }
}
