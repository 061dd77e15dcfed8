use crate::registry::RegistryOptions;
use crate::store::{InMemoryModelStore, ModelStore, SledModelStore};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

pub const SERVICE_NAME: &str = "model-registry";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sled,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    pub bind_addr: String,
    pub storage: StorageBackend,
    pub db_path: PathBuf,
    /// Write fresh predefined models at startup.
    pub seed_predefined: bool,
    pub reset_predefined_on_delete: bool,
}

impl ServiceConfig {
    /// Defaults < `MODELHUB_CONFIG_FILE` < `MODELHUB__*` environment.
    pub fn load() -> Result<Self> {
        let cfg = modelhub_core::config_builder(SERVICE_NAME)?
            .set_default("bind_addr", "0.0.0.0:5001")?
            .set_default("storage", "sled")?
            .set_default("db_path", "./data/models")?
            .set_default("seed_predefined", true)?
            .set_default("reset_predefined_on_delete", true)?
            .build()?;
        cfg.try_deserialize().context("invalid model-registry configuration")
    }

    pub fn open_store(&self) -> Result<Arc<dyn ModelStore>> {
        let store: Arc<dyn ModelStore> = match self.storage {
            StorageBackend::Sled => Arc::new(
                SledModelStore::open(&self.db_path)
                    .with_context(|| format!("opening sled store at {}", self.db_path.display()))?,
            ),
            StorageBackend::Memory => Arc::new(InMemoryModelStore::new()),
        };
        Ok(store)
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions { reset_predefined_on_delete: self.reset_predefined_on_delete }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_defaults() {
        std::env::set_var("MODELHUB__STORAGE", "memory");
        std::env::set_var("MODELHUB__RESET_PREDEFINED_ON_DELETE", "false");
        let cfg = ServiceConfig::load().unwrap();
        std::env::remove_var("MODELHUB__STORAGE");
        std::env::remove_var("MODELHUB__RESET_PREDEFINED_ON_DELETE");

        assert_eq!(cfg.service_name, SERVICE_NAME);
        assert_eq!(cfg.bind_addr, "0.0.0.0:5001");
        assert_eq!(cfg.storage, StorageBackend::Memory);
        assert!(cfg.seed_predefined);
        assert!(!cfg.registry_options().reset_predefined_on_delete);
        assert!(cfg.open_store().unwrap().list().unwrap().is_empty());
    }
}
