use anyhow::{Context, Result};
use model_registry::api::{self, AppState};
use model_registry::config::{ServiceConfig, SERVICE_NAME};
use model_registry::ModelRegistry;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    modelhub_core::init_tracing(SERVICE_NAME)?;
    modelhub_core::init_metrics();
    let cfg = ServiceConfig::load()?;
    info!(bind = %cfg.bind_addr, storage = ?cfg.storage, db_path = %cfg.db_path.display(), "starting model-registry");

    let registry = Arc::new(ModelRegistry::new(cfg.open_store()?, cfg.registry_options()));
    if cfg.seed_predefined {
        registry.seed_predefined().context("seeding predefined models")?;
    }

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    modelhub_core::mark_ready();
    info!(addr = %cfg.bind_addr, "model-registry listening");
    axum::serve(listener, api::router(AppState::new(registry)))
        .with_graceful_shutdown(modelhub_core::shutdown_signal())
        .await?;
    info!("model-registry stopped");
    Ok(())
}
