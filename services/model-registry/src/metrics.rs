use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

static REGISTRY_OPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("modelhub_registry_ops_total", "Registry operations by outcome", &["op", "outcome"])
        .expect("modelhub_registry_ops_total registers once")
});
static FIT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "modelhub_fit_duration_seconds",
        "Wall time spent fitting a model",
        &["model"],
        vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    )
    .expect("modelhub_fit_duration_seconds registers once")
});
static MODELS_CREATED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("modelhub_models_created_total", "Models added through create", &["model"])
        .expect("modelhub_models_created_total registers once")
});

/// `outcome` is `ok` or an error kind label.
pub fn record_op(op: &str, outcome: &str) { REGISTRY_OPS.with_label_values(&[op, outcome]).inc(); }

pub fn observe_fit(model: &str, seconds: f64) { FIT_DURATION.with_label_values(&[model]).observe(seconds); }

pub fn record_created(model: &str) { MODELS_CREATED.with_label_values(&[model]).inc(); }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_label() {
        let before = REGISTRY_OPS.with_label_values(&["unit_probe", "ok"]).get();
        record_op("unit_probe", "ok");
        record_op("unit_probe", "ok");
        assert_eq!(REGISTRY_OPS.with_label_values(&["unit_probe", "ok"]).get(), before + 2);
    }
}
