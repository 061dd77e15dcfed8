//! Model registry service: regression models behind an HTTP API, with
//! model state persisted between requests.

pub mod api;
pub mod config;
pub mod dataset;
pub mod error;
pub mod input;
mod locks;
pub mod metrics;
pub mod registry;
pub mod store;

pub use error::{RegistryError, StoreError};
pub use registry::{ModelRegistry, RegistryOptions};
