//! Regression estimators used by the model registry.
//!
//! Every model type implements [`Regressor`]: `fit`, `predict`, and a
//! hyperparameter mapping via `get_params`/`set_params`. [`Model`] wraps the
//! concrete variants so registry code never branches on the model type, and
//! owns the byte encoding stored between requests.
//!
//! Adding a model type means adding a variant to [`Model`] and an entry to
//! [`ModelKind`].

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub mod error;
pub mod forest;
mod linalg;
pub mod metrics;
pub mod ridge;
mod tree;

pub use error::{EstimatorError, Result};
pub use forest::{ForestParams, RandomForestRegressor};
pub use metrics::{rmse, round_to};
pub use ridge::{Ridge, RidgeParams};

/// Hyperparameters as exposed over the API: name -> JSON value.
pub type Params = serde_json::Map<String, Value>;

pub trait Regressor {
    /// Display name of the model type, stable across hyperparameter changes.
    fn name(&self) -> &'static str;
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()>;
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;
    fn get_params(&self) -> Params;
    /// Applies a partial mapping. Either every entry is accepted or the
    /// model is left untouched.
    fn set_params(&mut self, params: &Params) -> Result<()>;
    fn is_fitted(&self) -> bool;
}

/// Typed hyperparameter set with range checks beyond what serde enforces.
pub(crate) trait ParamSet: Serialize + DeserializeOwned {
    fn validate(&self) -> Result<()>;
}

pub(crate) fn params_to_map<P: ParamSet>(params: &P) -> Params {
    match serde_json::to_value(params) {
        Ok(Value::Object(map)) => map,
        _ => Params::new(),
    }
}

/// Merges `updates` over `current` and returns the validated result without
/// touching `current`. Keys must already exist in the current set.
pub(crate) fn merge_params<P: ParamSet>(current: &P, updates: &Params) -> Result<P> {
    let mut merged = params_to_map(current);
    if let Some(unknown) = updates.keys().find(|k| !merged.contains_key(k.as_str())) {
        let accepted: Vec<&str> = merged.keys().map(String::as_str).collect();
        return Err(EstimatorError::InvalidParameter(format!(
            "unknown parameter {unknown:?}, accepted parameters: {accepted:?}"
        )));
    }
    for (k, v) in updates {
        merged.insert(k.clone(), v.clone());
    }
    let next: P = serde_json::from_value(Value::Object(merged))
        .map_err(|e| EstimatorError::InvalidParameter(e.to_string()))?;
    next.validate()?;
    Ok(next)
}

pub(crate) fn check_fit_shapes(x: &ArrayView2<f64>, y: &ArrayView1<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(EstimatorError::Shape(format!("expected a non-empty matrix, got {:?}", x.dim())));
    }
    if x.nrows() != y.len() {
        return Err(EstimatorError::Shape(format!(
            "found input variables with inconsistent numbers of samples: [{}, {}]",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}

pub(crate) fn check_predict_width(x: &ArrayView2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(EstimatorError::Shape(format!(
            "X has {} features, but the model is expecting {} features as input",
            x.ncols(),
            n_features
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Ridge,
    RandomForest,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Ridge, ModelKind::RandomForest];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Ridge => "ridge",
            ModelKind::RandomForest => "random_forest",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Ridge => "Ridge",
            ModelKind::RandomForest => "RandomForestRegressor",
        }
    }

    /// Fresh, untrained instance with default hyperparameters.
    pub fn build(&self) -> Model {
        match self {
            ModelKind::Ridge => Model::Ridge(Ridge::default()),
            ModelKind::RandomForest => Model::RandomForest(RandomForestRegressor::default()),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = EstimatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ridge" => Ok(ModelKind::Ridge),
            "random_forest" => Ok(ModelKind::RandomForest),
            other => Err(EstimatorError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    Ridge(Ridge),
    RandomForest(RandomForestRegressor),
}

impl Model {
    pub fn kind(&self) -> ModelKind {
        match self {
            Model::Ridge(_) => ModelKind::Ridge,
            Model::RandomForest(_) => ModelKind::RandomForest,
        }
    }

    /// Encodes hyperparameters and learned state. The layout is private to
    /// this crate version and not meant to be read by other tools.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            Model::Ridge(m) => m as &dyn Regressor,
            Model::RandomForest(m) => m as &dyn Regressor,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            Model::Ridge(m) => m as &mut dyn Regressor,
            Model::RandomForest(m) => m as &mut dyn Regressor,
        }
    }
}

impl Regressor for Model {
    fn name(&self) -> &'static str { self.inner().name() }
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> { self.inner_mut().fit(x, y) }
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> { self.inner().predict(x) }
    fn get_params(&self) -> Params { self.inner().get_params() }
    fn set_params(&mut self, params: &Params) -> Result<()> { self.inner_mut().set_params(params) }
    fn is_fitted(&self) -> bool { self.inner().is_fitted() }
}
