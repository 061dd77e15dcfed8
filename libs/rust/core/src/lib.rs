//! Core shared utilities for modelhub services.
//!
//! Tracing bootstrap, layered configuration, liveness/readiness and the
//! Prometheus scrape endpoint. Services build on these instead of wiring
//! their own.

use anyhow::Result;
use axum::{http::StatusCode, response::{IntoResponse, Response}, routing::get, Json, Router};
use config::builder::DefaultState;
use config::ConfigBuilder;
use once_cell::sync::OnceCell;
use prometheus::{Encoder, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static METRICS_INIT: AtomicBool = AtomicBool::new(false);
static NODE_LIVENESS: AtomicBool = AtomicBool::new(true);
static NODE_READINESS: AtomicBool = AtomicBool::new(false);

/// Environment prefix for every modelhub setting.
pub const ENV_PREFIX: &str = "MODELHUB";

pub fn mark_ready() { NODE_READINESS.store(true, Ordering::SeqCst); }
pub fn clear_ready() { NODE_READINESS.store(false, Ordering::SeqCst); }
pub fn mark_not_live() { NODE_LIVENESS.store(false, Ordering::SeqCst); }
pub fn is_ready() -> bool { NODE_READINESS.load(Ordering::SeqCst) }

/// Reads a boolean-ish environment flag (`1` or `true`, case-insensitive).
pub fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Installs the global subscriber once. `RUST_LOG` drives filtering
/// (default `info`); `MODELHUB_JSON_LOG=1` switches to flattened JSON lines.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let fmt_layer = if env_flag("MODELHUB_JSON_LOG") {
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .boxed()
        };
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry().with(fmt_layer).with(env_filter).try_init()?;
        Ok(())
    })?;
    info!(service, "tracing initialized");
    Ok(())
}

/// Enables the `/metrics` endpoint. Collectors register themselves lazily in
/// the default Prometheus registry.
pub fn init_metrics() { METRICS_INIT.store(true, Ordering::SeqCst); }

/// Config layering shared by all services: defaults set by the caller, then an
/// optional file named by `MODELHUB_CONFIG_FILE`, then `MODELHUB__*` env vars.
pub fn config_builder(service: &str) -> Result<ConfigBuilder<DefaultState>> {
    let mut builder = config::Config::builder().set_default("service_name", service)?;
    if let Ok(file) = std::env::var("MODELHUB_CONFIG_FILE") {
        builder = builder.add_source(config::File::with_name(&file).required(false));
    }
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}

/// Liveness, readiness, status and metrics routes. Merge into a router whose
/// state has already been applied.
pub fn health_router() -> Router {
    Router::new()
        .route("/live", get(|| async { Json(serde_json::json!({"live": NODE_LIVENESS.load(Ordering::SeqCst)})) }))
        .route("/ready", get(|| async { Json(serde_json::json!({"ready": is_ready()})) }))
        .route("/status", get(|| async {
            Json(serde_json::json!({
                "live": NODE_LIVENESS.load(Ordering::SeqCst),
                "ready": is_ready(),
                "version": env!("CARGO_PKG_VERSION"),
            }))
        }))
        .route("/metrics", get(metrics_handler))
}

async fn metrics_handler() -> Response {
    if !METRICS_INIT.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response();
    }
    let metric_families = prometheus::default_registry().gather();
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&metric_families, &mut buf) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response();
    }
    ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], buf).into_response()
}

/// Resolves on ctrl-c and flips readiness off so probes drain traffic.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = ?e, "ctrl_c listener failed");
    }
    clear_ready();
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn env_flag_parses_truthy_values() {
        std::env::set_var("MODELHUB_TEST_FLAG_A", "TRUE");
        std::env::set_var("MODELHUB_TEST_FLAG_B", "0");
        assert!(env_flag("MODELHUB_TEST_FLAG_A"));
        assert!(!env_flag("MODELHUB_TEST_FLAG_B"));
        assert!(!env_flag("MODELHUB_TEST_FLAG_UNSET"));
    }

    #[test]
    fn config_builder_applies_caller_defaults() {
        let cfg = config_builder("svc").unwrap()
            .set_default("bind_addr", "127.0.0.1:1").unwrap()
            .build().unwrap();
        assert_eq!(cfg.get_string("service_name").unwrap(), "svc");
        assert_eq!(cfg.get_string("bind_addr").unwrap(), "127.0.0.1:1");
    }

    #[tokio::test]
    async fn live_endpoint_reports_ok() {
        let resp = health_router()
            .oneshot(Request::builder().uri("/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_served_after_init() {
        init_metrics();
        let resp = health_router()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
