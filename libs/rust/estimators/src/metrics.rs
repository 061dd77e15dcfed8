//! Fit-quality metrics.

use ndarray::ArrayView1;

/// Root-mean-squared error. Empty or mismatched inputs yield `NaN`.
pub fn rmse(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> f64 {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return f64::NAN;
    }
    let sse: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    (sse / y_true.len() as f64).sqrt()
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rmse_of_known_residuals() {
        let r = rmse(array![1.0, 2.0, 3.0].view(), array![2.0, 2.0, 1.0].view());
        assert!((r - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn rmse_mismatch_is_nan() {
        assert!(rmse(array![1.0].view(), array![1.0, 2.0].view()).is_nan());
    }

    #[test]
    fn rounds_to_four_places() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
    }
}
