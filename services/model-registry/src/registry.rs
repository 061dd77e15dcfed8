//! Store-backed registry of live model instances.
//!
//! Every call materializes the model from its stored bytes, works on it and,
//! for mutating operations, writes it back before returning. Nothing is
//! cached between calls, so the store is the single source of truth.
//!
//! Mutations of one id are serialized through [`KeyedLocks`]; id allocation
//! runs under a separate lock so two concurrent `create` calls never receive
//! the same id.

use crate::dataset::DatasetStore;
use crate::error::{RegistryError, Result};
use crate::locks::KeyedLocks;
use crate::metrics;
use crate::store::{ModelRecord, ModelStore};
use modelhub_estimators::{rmse, round_to, EstimatorError, Model, ModelKind, Params, Regressor};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Ids seeded at startup and the model type each one holds.
pub const PREDEFINED: [(u64, ModelKind); 2] = [(0, ModelKind::Ridge), (1, ModelKind::RandomForest)];

const RMSE_PLACES: i32 = 4;

#[derive(Debug, Clone, Copy)]
pub struct RegistryOptions {
    /// Deleting a predefined id stores a fresh untrained instance instead of
    /// removing the row.
    pub reset_predefined_on_delete: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self { Self { reset_predefined_on_delete: true } }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    pub model_id: u64,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescription {
    pub model: String,
    pub params: Params,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    pub rmse: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed { name: String },
    Reset { name: String },
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteOutcome::Removed { name } => write!(f, "Model {name} was successfully deleted"),
            DeleteOutcome::Reset { name } => write!(f, "Model {name} was reset to its untrained default"),
        }
    }
}

fn is_predefined(model_id: u64) -> bool { PREDEFINED.iter().any(|(id, _)| *id == model_id) }

/// Model type of a stored row, read from its display name so a row with
/// undecodable bytes can still be reset.
fn kind_of_record(record: &ModelRecord) -> Result<ModelKind> {
    ModelKind::ALL.into_iter().find(|k| k.display_name() == record.model_name).ok_or_else(|| RegistryError::Corrupt {
        id: record.model_id,
        reason: format!("unknown model name {:?}", record.model_name),
    })
}

pub struct ModelRegistry {
    store: Arc<dyn ModelStore>,
    datasets: Arc<DatasetStore>,
    locks: KeyedLocks,
    alloc: Mutex<()>,
    opts: RegistryOptions,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ModelStore>, opts: RegistryOptions) -> Self {
        Self { store, datasets: Arc::new(DatasetStore::new()), locks: KeyedLocks::new(), alloc: Mutex::new(()), opts }
    }

    pub fn datasets(&self) -> &DatasetStore { &self.datasets }

    pub fn list(&self) -> Result<Vec<ModelEntry>> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .map(|s| ModelEntry { model_id: s.model_id, model: s.model_name })
            .collect())
    }

    /// Adds a fresh untrained model and returns its id. An unknown
    /// `model_type` fails before an id is allocated.
    pub fn create(&self, model_type: &str) -> Result<u64> {
        let kind: ModelKind = model_type.parse().map_err(|_| RegistryError::InvalidType(model_type.to_string()))?;
        let _alloc = self.alloc.lock();
        let model_id = self.store.next_id()?;
        self.save(model_id, &kind.build())?;
        metrics::record_created(kind.display_name());
        info!(model_id, model = kind.display_name(), "model created");
        Ok(model_id)
    }

    pub fn describe(&self, model_id: u64) -> Result<ModelDescription> {
        let model = self.load(model_id)?;
        Ok(describe(&model))
    }

    /// Applies a partial hyperparameter mapping. Every key is validated
    /// before any is applied; on error the stored model is unchanged.
    pub fn configure(&self, model_id: u64, params: &Params) -> Result<ModelDescription> {
        let _guard = self.locks.lock(model_id);
        let mut model = self.load(model_id)?;
        model.set_params(params).map_err(|e| RegistryError::from_estimator(model_id, e))?;
        self.save(model_id, &model)?;
        info!(model_id, keys = ?params.keys().collect::<Vec<_>>(), "model configured");
        Ok(describe(&model))
    }

    /// Trains on `x`/`y` and commits the trained state. The RMSE is measured
    /// on the training rows.
    pub fn fit(&self, model_id: u64, x: &Array2<f64>, y: &Array1<f64>) -> Result<FitReport> {
        let _guard = self.locks.lock(model_id);
        let mut model = self.load(model_id)?;
        let report = train(model_id, &mut model, x.view(), y.view())?;
        self.save(model_id, &model)?;
        info!(model_id, rows = x.nrows(), rmse = report.rmse, "model fitted");
        Ok(report)
    }

    pub fn fit_dataset(&self, model_id: u64, dataset: &str) -> Result<FitReport> {
        let data = self.datasets.get(dataset)?;
        let _guard = self.locks.lock(model_id);
        let mut model = self.load(model_id)?;
        let report = train(model_id, &mut model, data.x.view(), data.y.view())?;
        self.save(model_id, &model)?;
        info!(model_id, dataset, rows = data.y.len(), rmse = report.rmse, "model fitted on dataset");
        Ok(report)
    }

    /// Scores a trained model on a held dataset. Never commits.
    pub fn validate(&self, model_id: u64, dataset: &str) -> Result<FitReport> {
        let model = self.load(model_id)?;
        let data = self.datasets.get(dataset)?;
        if !model.is_fitted() {
            return Err(RegistryError::NotFitted(model_id));
        }
        let y_pred = model.predict(data.x.view()).map_err(|e| RegistryError::from_estimator(model_id, e))?;
        let score = round_to(rmse(data.y.view(), y_pred.view()), RMSE_PLACES);
        debug!(model_id, dataset, rmse = score, "model validated");
        Ok(FitReport { rmse: score })
    }

    /// Predictions in input row order. Never commits.
    pub fn predict(&self, model_id: u64, x: &Array2<f64>) -> Result<Vec<f64>> {
        let model = self.load(model_id)?;
        if !model.is_fitted() {
            return Err(RegistryError::NotFitted(model_id));
        }
        let y_pred = model.predict(x.view()).map_err(|e| match e {
            EstimatorError::Shape(msg) => RegistryError::MalformedInput(msg),
            other => RegistryError::from_estimator(model_id, other),
        })?;
        Ok(y_pred.to_vec())
    }

    pub fn delete(&self, model_id: u64) -> Result<DeleteOutcome> {
        let _guard = self.locks.lock(model_id);
        let record = self.store.get(model_id)?;
        if is_predefined(model_id) && self.opts.reset_predefined_on_delete {
            // Rebuild from the row's own type; the id may hold a user model
            // when seeding is off.
            let kind = kind_of_record(&record)?;
            self.save(model_id, &kind.build())?;
            info!(model_id, model = kind.display_name(), "predefined model reset");
            return Ok(DeleteOutcome::Reset { name: record.model_name });
        }
        self.store.delete(model_id)?;
        info!(model_id, model = %record.model_name, "model deleted");
        Ok(DeleteOutcome::Removed { name: record.model_name })
    }

    /// Overwrites every predefined id with a fresh untrained instance.
    pub fn seed_predefined(&self) -> Result<()> {
        let _alloc = self.alloc.lock();
        for (model_id, kind) in PREDEFINED {
            let _guard = self.locks.lock(model_id);
            self.save(model_id, &kind.build())?;
        }
        info!(count = PREDEFINED.len(), "predefined models seeded");
        Ok(())
    }

    fn load(&self, model_id: u64) -> Result<Model> {
        let record = self.store.get(model_id)?;
        Model::from_bytes(&record.model_binary).map_err(|e| RegistryError::from_estimator(model_id, e))
    }

    fn save(&self, model_id: u64, model: &Model) -> Result<()> {
        let model_binary = model.to_bytes().map_err(|e| RegistryError::Internal(e.to_string()))?;
        self.store.put(&ModelRecord { model_id, model_name: model.name().to_string(), model_binary })?;
        Ok(())
    }
}

fn describe(model: &Model) -> ModelDescription {
    ModelDescription { model: model.name().to_string(), params: model.get_params() }
}

fn train(model_id: u64, model: &mut Model, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<FitReport> {
    if x.nrows() != y.len() {
        return Err(RegistryError::ShapeMismatch(format!(
            "train_data has {} rows but target has {} values",
            x.nrows(),
            y.len()
        )));
    }
    let started = Instant::now();
    model.fit(x, y).map_err(|e| RegistryError::from_estimator(model_id, e))?;
    metrics::observe_fit(model.name(), started.elapsed().as_secs_f64());
    let y_pred = model.predict(x).map_err(|e| RegistryError::from_estimator(model_id, e))?;
    // Non-finite state cannot be encoded, so it must never reach the store.
    if let Some(row) = y_pred.iter().position(|v| !v.is_finite()) {
        return Err(RegistryError::FitFailed(format!(
            "training produced a non-finite prediction ({}) for row {row}",
            y_pred[row]
        )));
    }
    let score = rmse(y, y_pred.view());
    if !score.is_finite() {
        return Err(RegistryError::FitFailed(format!("training error is not finite ({score})")));
    }
    Ok(FitReport { rmse: round_to(score, RMSE_PLACES) })
}
