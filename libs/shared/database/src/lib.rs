pub mod memory;
pub mod state;
pub mod store;

pub use memory::InMemoryDocumentStore;
pub use state::AppState;
pub use store::{
    merge_json, DocumentKey, DocumentStore, DocumentStoreExt, Precondition, StoreError,
    Transaction, TransactionBody, TransactionDecision,
};
