//! Durable mapping from model id to (display name, serialized model).
//!
//! The registry only talks to [`ModelStore`]; the backend is picked from
//! config at startup.

use crate::error::StoreError;
use serde::Serialize;

mod memory;
mod sled_store;

pub use memory::InMemoryModelStore;
pub use sled_store::SledModelStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRecord {
    pub model_id: u64,
    pub model_name: String,
    pub model_binary: Vec<u8>,
}

/// Metadata-only view of a record; listing never touches model bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub model_id: u64,
    pub model_name: String,
}

pub trait ModelStore: Send + Sync {
    /// Inserts or overwrites the row for `record.model_id`, committed before
    /// returning.
    fn put(&self, record: &ModelRecord) -> Result<(), StoreError>;
    fn get(&self, model_id: u64) -> Result<ModelRecord, StoreError>;
    fn delete(&self, model_id: u64) -> Result<(), StoreError>;
    /// All rows in ascending id order.
    fn list(&self) -> Result<Vec<ModelSummary>, StoreError>;
    /// `max(id) + 1`, or 0 for an empty store.
    fn next_id(&self) -> Result<u64, StoreError>;
}

/// Behaviour every backend must share.
#[cfg(test)]
pub(crate) fn check_store_contract(store: &dyn ModelStore) {
    let record = |id: u64, name: &str, bytes: &[u8]| ModelRecord {
        model_id: id,
        model_name: name.to_string(),
        model_binary: bytes.to_vec(),
    };

    assert_eq!(store.next_id().unwrap(), 0);
    assert!(store.list().unwrap().is_empty());
    assert!(matches!(store.get(0), Err(StoreError::NotFound(0))));
    assert!(matches!(store.delete(0), Err(StoreError::NotFound(0))));

    store.put(&record(0, "Ridge", b"a")).unwrap();
    store.put(&record(5, "RandomForestRegressor", b"b")).unwrap();
    assert_eq!(store.next_id().unwrap(), 6);
    assert_eq!(store.get(5).unwrap(), record(5, "RandomForestRegressor", b"b"));

    store.put(&record(0, "Ridge", b"overwritten")).unwrap();
    assert_eq!(store.get(0).unwrap().model_binary, b"overwritten".to_vec());

    let ids: Vec<u64> = store.list().unwrap().into_iter().map(|s| s.model_id).collect();
    assert_eq!(ids, vec![0, 5]);

    store.delete(5).unwrap();
    assert!(matches!(store.get(5), Err(StoreError::NotFound(5))));
    assert_eq!(store.next_id().unwrap(), 1);

    store.put(&record(300, "Ridge", b"c")).unwrap();
    assert_eq!(store.next_id().unwrap(), 301);
}
