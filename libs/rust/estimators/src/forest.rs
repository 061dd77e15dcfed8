//! Bagged ensemble of regression trees.

use crate::tree::{RegressionTree, TreeSettings};
use crate::{check_fit_shapes, check_predict_width, merge_params, params_to_map};
use crate::{EstimatorError, ParamSet, Params, Regressor, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of features considered at each split.
    pub max_features: f64,
    pub bootstrap: bool,
    pub random_state: Option<u64>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1.0,
            bootstrap: true,
            random_state: None,
        }
    }
}

impl ParamSet for ForestParams {
    fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(EstimatorError::InvalidParameter(msg));
        if self.n_estimators == 0 {
            return bad("n_estimators must be at least 1".into());
        }
        if self.max_depth == Some(0) {
            return bad("max_depth must be null or at least 1".into());
        }
        if self.min_samples_split < 2 {
            return bad(format!("min_samples_split must be at least 2, got {}", self.min_samples_split));
        }
        if self.min_samples_leaf == 0 {
            return bad("min_samples_leaf must be at least 1".into());
        }
        if !(self.max_features > 0.0 && self.max_features <= 1.0) {
            return bad(format!("max_features must be in (0, 1], got {}", self.max_features));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForestFit {
    n_features: usize,
    trees: Vec<RegressionTree>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    fitted: Option<ForestFit>,
}

impl RandomForestRegressor {
    pub fn new(params: ForestParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params, fitted: None })
    }

    pub fn params(&self) -> &ForestParams { &self.params }

    pub fn n_trees(&self) -> usize { self.fitted.as_ref().map_or(0, |f| f.trees.len()) }
}

impl Regressor for RandomForestRegressor {
    fn name(&self) -> &'static str { "RandomForestRegressor" }

    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_fit_shapes(&x, &y)?;
        let (n, p) = x.dim();
        let seed = self.params.random_state.unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = StdRng::seed_from_u64(seed);
        let settings = TreeSettings {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: ((self.params.max_features * p as f64) as usize).clamp(1, p),
        };

        let trees = (0..self.params.n_estimators)
            .map(|_| {
                let samples: Vec<usize> = if self.params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::grow(x, y, samples, &settings, &mut rng)
            })
            .collect::<Vec<_>>();

        tracing::debug!(trees = trees.len(), samples = n, features = p, seed, "forest fitted");
        self.fitted = Some(ForestFit { n_features: p, trees });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let fit = self.fitted.as_ref().ok_or(EstimatorError::NotFitted)?;
        check_predict_width(&x, fit.n_features)?;
        let n_trees = fit.trees.len() as f64;
        Ok(x.rows()
            .into_iter()
            .map(|row| fit.trees.iter().map(|t| t.predict_row(row) / n_trees).sum::<f64>())
            .collect())
    }

    fn get_params(&self) -> Params { params_to_map(&self.params) }

    fn set_params(&mut self, params: &Params) -> Result<()> {
        self.params = merge_params(&self.params, params)?;
        Ok(())
    }

    fn is_fitted(&self) -> bool { self.fitted.is_some() }
}
