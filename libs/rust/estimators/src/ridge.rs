//! L2-regularized linear least squares.
//!
//! Minimizes `||y - Xw - b||^2 + alpha * ||w||^2`. With `fit_intercept` the
//! data is centered first so the intercept is not penalized.

use crate::linalg::solve;
use crate::{check_fit_shapes, check_predict_width, merge_params, params_to_map};
use crate::{EstimatorError, ParamSet, Params, Regressor, Result};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RidgeParams {
    pub alpha: f64,
    pub fit_intercept: bool,
}

impl Default for RidgeParams {
    fn default() -> Self { Self { alpha: 1.0, fit_intercept: true } }
}

impl ParamSet for RidgeParams {
    fn validate(&self) -> Result<()> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(EstimatorError::InvalidParameter(format!(
                "alpha must be a non-negative float, got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RidgeFit {
    coef: Vec<f64>,
    intercept: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ridge {
    params: RidgeParams,
    fitted: Option<RidgeFit>,
}

impl Ridge {
    pub fn new(params: RidgeParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params, fitted: None })
    }

    pub fn params(&self) -> &RidgeParams { &self.params }

    pub fn coef(&self) -> Option<&[f64]> { self.fitted.as_ref().map(|f| f.coef.as_slice()) }

    pub fn intercept(&self) -> Option<f64> { self.fitted.as_ref().map(|f| f.intercept) }
}

impl Regressor for Ridge {
    fn name(&self) -> &'static str { "Ridge" }

    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_fit_shapes(&x, &y)?;
        let p = x.ncols();
        let (x_mean, y_mean) = if self.params.fit_intercept {
            let x_mean = x.mean_axis(Axis(0)).ok_or_else(|| EstimatorError::Shape("empty design matrix".into()))?;
            let y_mean = y.mean().ok_or_else(|| EstimatorError::Shape("empty target".into()))?;
            (x_mean, y_mean)
        } else {
            (Array1::zeros(p), 0.0)
        };
        let xc = &x - &x_mean;
        let yc = &y - y_mean;

        let mut gram = xc.t().dot(&xc);
        for i in 0..p {
            gram[[i, i]] += self.params.alpha;
        }
        let rhs = xc.t().dot(&yc);
        let w = solve(gram, rhs)?;
        let intercept = if self.params.fit_intercept { y_mean - x_mean.dot(&w) } else { 0.0 };

        tracing::debug!(features = p, samples = x.nrows(), alpha = self.params.alpha, "ridge fitted");
        self.fitted = Some(RidgeFit { coef: w.to_vec(), intercept });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let fit = self.fitted.as_ref().ok_or(EstimatorError::NotFitted)?;
        check_predict_width(&x, fit.coef.len())?;
        let coef = ArrayView1::from(fit.coef.as_slice());
        Ok(x.dot(&coef) + fit.intercept)
    }

    fn get_params(&self) -> Params { params_to_map(&self.params) }

    fn set_params(&mut self, params: &Params) -> Result<()> {
        self.params = merge_params(&self.params, params)?;
        Ok(())
    }

    fn is_fitted(&self) -> bool { self.fitted.is_some() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::json;

    fn round6(v: f64) -> f64 { (v * 1e6).round() / 1e6 }

    #[test]
    fn default_fit_matches_reference_coefficients() {
        let mut model = Ridge::default();
        model.fit(array![[1.0], [2.0], [5.0]].view(), array![1.0, 3.0, 8.0].view()).unwrap();
        assert_eq!(round6(model.coef().unwrap()[0]), 1.551724);
        assert_eq!(round6(model.intercept().unwrap()), -0.137931);

        let pred = model.predict(array![[1.0], [2.0], [5.0]].view()).unwrap();
        for (got, want) in pred.iter().zip([1.413793, 2.965517, 7.620689]) {
            assert!((got - want).abs() < 1e-6, "{got} vs {want}");
        }
    }

    #[test]
    fn predict_before_fit_is_not_fitted() {
        let model = Ridge::default();
        assert!(matches!(model.predict(array![[1.0]].view()), Err(EstimatorError::NotFitted)));
    }

    #[test]
    fn without_intercept_line_passes_through_origin() {
        let mut model = Ridge::new(RidgeParams { alpha: 0.0, fit_intercept: false }).unwrap();
        model.fit(array![[1.0], [2.0], [3.0]].view(), array![2.0, 4.0, 6.0].view()).unwrap();
        assert!((model.coef().unwrap()[0] - 2.0).abs() < 1e-12);
        assert_eq!(model.intercept(), Some(0.0));
    }

    #[test]
    fn multi_feature_fit_recovers_plane() {
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [2.0, 1.0], [1.0, 3.0]];
        let y = x.map_axis(Axis(1), |r| 3.0 * r[0] - 2.0 * r[1] + 0.5);
        let mut model = Ridge::new(RidgeParams { alpha: 1e-9, fit_intercept: true }).unwrap();
        model.fit(x.view(), y.view()).unwrap();
        let coef = model.coef().unwrap();
        assert!((coef[0] - 3.0).abs() < 1e-6);
        assert!((coef[1] + 2.0).abs() < 1e-6);
        assert!((model.intercept().unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn predict_rejects_wrong_width() {
        let mut model = Ridge::default();
        model.fit(array![[1.0], [2.0]].view(), array![1.0, 2.0].view()).unwrap();
        assert!(matches!(model.predict(array![[1.0, 2.0]].view()), Err(EstimatorError::Shape(_))));
    }

    #[test]
    fn fit_rejects_row_mismatch() {
        let mut model = Ridge::default();
        let res = model.fit(array![[1.0], [2.0]].view(), array![1.0].view());
        assert!(matches!(res, Err(EstimatorError::Shape(_))));
        assert!(!model.is_fitted());
    }

    #[test]
    fn set_params_validates_alpha() {
        let mut model = Ridge::default();
        let neg = json!({"alpha": -1.0}).as_object().cloned().unwrap();
        assert!(model.set_params(&neg).is_err());
        let ok = json!({"alpha": 2}).as_object().cloned().unwrap();
        model.set_params(&ok).unwrap();
        assert_eq!(model.get_params()["alpha"], json!(2.0));
        assert_eq!(model.get_params()["fit_intercept"], json!(true));
    }
}
