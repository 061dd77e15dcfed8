use super::{ModelRecord, ModelStore, ModelSummary};
use crate::error::StoreError;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Process-local store. Contents vanish on restart.
#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    rows: RwLock<BTreeMap<u64, ModelRecord>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self { Self::default() }
}

impl ModelStore for InMemoryModelStore {
    fn put(&self, record: &ModelRecord) -> Result<(), StoreError> {
        self.rows.write().insert(record.model_id, record.clone());
        Ok(())
    }

    fn get(&self, model_id: u64) -> Result<ModelRecord, StoreError> {
        self.rows.read().get(&model_id).cloned().ok_or(StoreError::NotFound(model_id))
    }

    fn delete(&self, model_id: u64) -> Result<(), StoreError> {
        self.rows.write().remove(&model_id).map(|_| ()).ok_or(StoreError::NotFound(model_id))
    }

    fn list(&self) -> Result<Vec<ModelSummary>, StoreError> {
        Ok(self
            .rows
            .read()
            .values()
            .map(|r| ModelSummary { model_id: r.model_id, model_name: r.model_name.clone() })
            .collect())
    }

    fn next_id(&self) -> Result<u64, StoreError> {
        Ok(self.rows.read().keys().next_back().map_or(0, |max| max + 1))
    }
}
