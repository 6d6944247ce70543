use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Address of one document: a collection name plus the document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub collection: String,
    pub id: String,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Field-equality guard for conditional merges.
#[derive(Debug, Clone, PartialEq)]
pub struct Precondition {
    pub field: String,
    pub equals: Value,
}

impl Precondition {
    pub fn field_equals(field: impl Into<String>, equals: Value) -> Self {
        Self {
            field: field.into(),
            equals,
        }
    }

    pub fn holds_for(&self, document: &Value) -> bool {
        document.get(&self.field) == Some(&self.equals)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(DocumentKey),

    #[error("Document already exists: {0}")]
    AlreadyExists(DocumentKey),

    #[error("Precondition failed on {key}: expected {field} to equal {expected}")]
    PreconditionFailed {
        key: DocumentKey,
        field: String,
        expected: Value,
    },

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Whether a transaction body wants its staged writes applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionDecision {
    Commit,
    Rollback,
}

/// Read/write handle passed to a transaction body.
///
/// Reads observe the committed state as of the start of the transaction.
/// Writes are staged and only become visible if the body returns
/// [`TransactionDecision::Commit`] and every staged write validates; otherwise
/// none of them are applied.
pub trait Transaction {
    fn get(&mut self, key: &DocumentKey) -> Result<Option<Value>, StoreError>;

    /// Stage creation of a new document. Commit fails with
    /// [`StoreError::AlreadyExists`] if the id is taken.
    fn create(&mut self, key: &DocumentKey, document: Value);

    /// Stage a deep merge into an existing document.
    fn merge(&mut self, key: &DocumentKey, patch: Value);
}

pub type TransactionBody<'f> =
    Box<dyn FnOnce(&mut dyn Transaction) -> TransactionDecision + Send + 'f>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, key: &DocumentKey) -> Result<Option<Value>, StoreError>;

    /// Create or fully replace a document.
    async fn set(&self, key: &DocumentKey, document: Value) -> Result<(), StoreError>;

    /// Deep-merge `patch` into an existing document as one atomic write.
    /// Keys absent from the patch are left untouched.
    async fn merge(&self, key: &DocumentKey, patch: Value) -> Result<(), StoreError>;

    /// Like [`DocumentStore::merge`], but only applied while the precondition
    /// holds on the stored document. Returns the merged document.
    async fn merge_if(
        &self,
        key: &DocumentKey,
        precondition: &Precondition,
        patch: Value,
    ) -> Result<Value, StoreError>;

    /// All documents of a collection whose `field` equals `equals`.
    async fn query(
        &self,
        collection: &str,
        field: &str,
        equals: &Value,
    ) -> Result<Vec<Value>, StoreError>;

    /// Run `body` in isolation from every other transaction on this store.
    async fn run_transaction<'f>(&self, body: TransactionBody<'f>) -> Result<(), StoreError>;
}

/// Typed conveniences over any [`DocumentStore`].
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    async fn get_as<T>(&self, key: &DocumentKey) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(document) => Ok(Some(serde_json::from_value(document)?)),
            None => Ok(None),
        }
    }

    /// Run a transaction whose body returns a typed result. An `Err` from the
    /// body rolls the transaction back and is handed back unchanged.
    async fn run_in_transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, E> + Send,
        T: Send,
        E: From<StoreError> + Send,
    {
        let mut outcome: Option<Result<T, E>> = None;

        self.run_transaction(Box::new(|tx: &mut dyn Transaction| {
            let result = body(tx);
            let decision = if result.is_ok() {
                TransactionDecision::Commit
            } else {
                TransactionDecision::Rollback
            };
            outcome = Some(result);
            decision
        }))
        .await?;

        outcome.unwrap_or_else(|| {
            Err(StoreError::Transaction("transaction body was never run".to_string()).into())
        })
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

/// Recursive JSON object merge. Objects are merged key by key; any other
/// value in the patch replaces the target value.
pub fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match target_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_json(existing, value)
                    }
                    _ => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_json_adds_nested_key_without_touching_siblings() {
        let mut doc = json!({
            "status": "pending",
            "dismissed_by": { "viewer-a": true }
        });

        merge_json(&mut doc, json!({ "dismissed_by": { "viewer-b": true } }));

        assert_eq!(doc["status"], "pending");
        assert_eq!(doc["dismissed_by"]["viewer-a"], true);
        assert_eq!(doc["dismissed_by"]["viewer-b"], true);
    }

    #[test]
    fn test_merge_json_replaces_scalars_and_null_maps() {
        let mut doc = json!({ "is_paid": false, "dismissed_by": null });

        merge_json(&mut doc, json!({ "is_paid": true, "dismissed_by": { "viewer-a": true } }));

        assert_eq!(doc, json!({ "is_paid": true, "dismissed_by": { "viewer-a": true } }));
    }

    #[test]
    fn test_precondition_matches_field_value() {
        let doc = json!({ "status": "confirmed" });
        assert!(Precondition::field_equals("status", json!("confirmed")).holds_for(&doc));
        assert!(!Precondition::field_equals("status", json!("pending")).holds_for(&doc));
        assert!(!Precondition::field_equals("missing", json!("x")).holds_for(&doc));
    }
}
