//! sled-backed store. Two trees share the big-endian id as key:
//! `model_name` holds the UTF-8 display name, `model_binary` the encoded
//! model. Both are written in one transaction and flushed before returning.

use super::{ModelRecord, ModelStore, ModelSummary};
use crate::error::StoreError;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use tracing::debug;

const NAMES_TREE: &str = "model_name";
const BINARIES_TREE: &str = "model_binary";

#[derive(Clone)]
pub struct SledModelStore {
    db: Db,
    names: Tree,
    binaries: Tree,
}

impl SledModelStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "sled store opened");
        Self::with_db(db)
    }

    /// Store deleted when dropped; used by tests and throwaway runs.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::with_db(sled::Config::new().temporary(true).open()?)
    }

    fn with_db(db: Db) -> Result<Self, StoreError> {
        let names = db.open_tree(NAMES_TREE)?;
        let binaries = db.open_tree(BINARIES_TREE)?;
        Ok(Self { db, names, binaries })
    }
}

fn key(id: u64) -> [u8; 8] { id.to_be_bytes() }

fn decode_id(raw: &[u8]) -> Result<u64, StoreError> {
    <[u8; 8]>::try_from(raw)
        .map(u64::from_be_bytes)
        .map_err(|_| StoreError::Corrupt { id: 0, reason: format!("key of {} bytes", raw.len()) })
}

fn decode_name(id: u64, raw: &[u8]) -> Result<String, StoreError> {
    String::from_utf8(raw.to_vec()).map_err(|e| StoreError::Corrupt { id, reason: e.to_string() })
}

impl ModelStore for SledModelStore {
    fn put(&self, record: &ModelRecord) -> Result<(), StoreError> {
        let k = key(record.model_id);
        (&self.names, &self.binaries)
            .transaction(|(names, binaries)| -> ConflictableTransactionResult<(), ()> {
                names.insert(&k[..], record.model_name.as_bytes())?;
                binaries.insert(&k[..], record.model_binary.as_slice())?;
                Ok(())
            })
            .map_err(|e| match e {
                TransactionError::Storage(e) => StoreError::Backend(e),
                TransactionError::Abort(()) => StoreError::Aborted,
            })?;
        self.db.flush()?;
        Ok(())
    }

    fn get(&self, model_id: u64) -> Result<ModelRecord, StoreError> {
        let k = key(model_id);
        let name = self.names.get(&k[..])?.ok_or(StoreError::NotFound(model_id))?;
        let binary = self.binaries.get(&k[..])?.ok_or_else(|| StoreError::Corrupt {
            id: model_id,
            reason: "name row without model_binary".into(),
        })?;
        Ok(ModelRecord {
            model_id,
            model_name: decode_name(model_id, &name)?,
            model_binary: binary.to_vec(),
        })
    }

    fn delete(&self, model_id: u64) -> Result<(), StoreError> {
        let k = key(model_id);
        let res = (&self.names, &self.binaries).transaction(
            |(names, binaries)| -> ConflictableTransactionResult<(), ()> {
                if names.remove(&k[..])?.is_none() {
                    return Err(ConflictableTransactionError::Abort(()));
                }
                binaries.remove(&k[..])?;
                Ok(())
            },
        );
        match res {
            Ok(()) => {}
            Err(TransactionError::Abort(())) => return Err(StoreError::NotFound(model_id)),
            Err(TransactionError::Storage(e)) => return Err(StoreError::Backend(e)),
        }
        self.db.flush()?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<ModelSummary>, StoreError> {
        self.names
            .iter()
            .map(|kv| -> Result<ModelSummary, StoreError> {
                let (k, v) = kv?;
                let model_id = decode_id(&k)?;
                Ok(ModelSummary { model_id, model_name: decode_name(model_id, &v)? })
            })
            .collect()
    }

    fn next_id(&self) -> Result<u64, StoreError> {
        match self.names.last()? {
            Some((k, _)) => Ok(decode_id(&k)? + 1),
            None => Ok(0),
        }
    }
}
