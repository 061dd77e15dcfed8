//! HTTP surface of the registry.
//!
//! Handlers decode JSON, hand the work to the blocking pool and map
//! [`RegistryError`] to a status code. Error bodies are the error message as
//! a JSON string.

use crate::dataset::DatasetInfo;
use crate::error::RegistryError;
use crate::input::{matrix_from_json, vector_from_json};
use crate::metrics;
use crate::registry::{ModelDescription, ModelEntry, ModelRegistry};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use modelhub_estimators::Params;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>) -> Self { Self { registry } }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/models", get(list_models).post(create_model))
        .route("/models/:id", get(describe_model).put(configure_model).delete(delete_model))
        .route("/models/:id/fit", put(fit_model))
        .route("/models/:id/fit_dataset", put(fit_model_on_dataset))
        .route("/models/:id/validate", put(validate_model))
        .route("/models/:id/predict", put(predict))
        .route("/datasets", post(load_dataset).get(list_datasets))
        .route("/datasets/:name", delete(remove_dataset))
        .with_state(state)
        .merge(modelhub_core::health_router())
        .layer(TraceLayer::new_for_http())
}

impl RegistryError {
    pub fn status(&self) -> StatusCode {
        match self {
            RegistryError::NotFound(_) | RegistryError::DatasetNotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::InvalidType(_)
            | RegistryError::InvalidParameter(_)
            | RegistryError::MalformedInput(_)
            | RegistryError::ShapeMismatch(_)
            | RegistryError::FitFailed(_) => StatusCode::BAD_REQUEST,
            RegistryError::NotFitted(_) => StatusCode::FAILED_DEPENDENCY,
            RegistryError::Corrupt { .. } | RegistryError::Store(_) | RegistryError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, kind = self.kind(), "request failed");
        } else {
            warn!(error = %self, kind = self.kind(), status = status.as_u16(), "request rejected");
        }
        (status, Json(self.to_string())).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, RegistryError>;

/// Runs a registry call on the blocking pool and counts its outcome.
async fn blocking<T, F>(op: &'static str, f: F) -> Result<T, RegistryError>
where
    F: FnOnce() -> Result<T, RegistryError> + Send + 'static,
    T: Send + 'static,
{
    let res = tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(RegistryError::Internal(format!("{op} task failed: {e}"))));
    metrics::record_op(op, res.as_ref().map_or_else(|e| e.kind(), |_| "ok"));
    res
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, RegistryError> {
    payload.map(|Json(v)| v).map_err(|rejection| RegistryError::MalformedInput(rejection.body_text()))
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    model_type: String,
}

#[derive(Debug, Deserialize)]
struct ConfigureRequest {
    params: Params,
}

#[derive(Debug, Deserialize)]
struct FitRequest {
    train_data: Value,
    target: Value,
}

#[derive(Debug, Deserialize)]
struct PredictRequest {
    data: Value,
}

#[derive(Debug, Deserialize)]
struct DatasetRequest {
    dataset: String,
}

#[derive(Debug, Deserialize)]
struct LoadDatasetRequest {
    name: String,
    target_column: String,
    csv: String,
}

async fn list_models(State(state): State<AppState>) -> ApiResult<Vec<ModelEntry>> {
    let registry = state.registry;
    blocking("list", move || registry.list()).await.map(Json)
}

async fn create_model(
    State(state): State<AppState>,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> ApiResult<String> {
    let req = body(payload)?;
    let registry = state.registry;
    let model_id = blocking("create", move || registry.create(&req.model_type)).await?;
    Ok(Json(format!("Added new model with model_id={model_id}")))
}

async fn describe_model(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<ModelDescription> {
    let registry = state.registry;
    blocking("describe", move || registry.describe(id)).await.map(Json)
}

async fn configure_model(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    payload: Result<Json<ConfigureRequest>, JsonRejection>,
) -> ApiResult<ModelDescription> {
    let req = body(payload)?;
    let registry = state.registry;
    blocking("configure", move || registry.configure(id, &req.params)).await.map(Json)
}

async fn delete_model(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<String> {
    let registry = state.registry;
    let outcome = blocking("delete", move || registry.delete(id)).await?;
    Ok(Json(outcome.to_string()))
}

async fn fit_model(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    payload: Result<Json<FitRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let req = body(payload)?;
    let registry = state.registry;
    let report = blocking("fit", move || {
        let x = matrix_from_json(&req.train_data)?;
        let y = vector_from_json(&req.target)?;
        registry.fit(id, &x, &y)
    })
    .await?;
    Ok(Json(json!({"status": "Fitted on train data", "RMSE on train": report.rmse})))
}

async fn fit_model_on_dataset(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    payload: Result<Json<DatasetRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let req = body(payload)?;
    let registry = state.registry;
    let report = blocking("fit_dataset", move || registry.fit_dataset(id, &req.dataset)).await?;
    Ok(Json(json!({"status": "Fitted on train data", "RMSE on train": report.rmse})))
}

async fn validate_model(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    payload: Result<Json<DatasetRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let req = body(payload)?;
    let registry = state.registry;
    let report = blocking("validate", move || registry.validate(id, &req.dataset)).await?;
    Ok(Json(json!({"RMSE on dataset": report.rmse})))
}

async fn predict(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let req = body(payload)?;
    let registry = state.registry;
    let y_pred = blocking("predict", move || {
        let x = matrix_from_json(&req.data)?;
        registry.predict(id, &x)
    })
    .await?;
    Ok(Json(json!({"y_pred": y_pred})))
}

async fn load_dataset(
    State(state): State<AppState>,
    payload: Result<Json<LoadDatasetRequest>, JsonRejection>,
) -> ApiResult<DatasetInfo> {
    let req = body(payload)?;
    let registry = state.registry;
    blocking("load_dataset", move || registry.datasets().load(&req.name, &req.csv, &req.target_column))
        .await
        .map(Json)
}

async fn list_datasets(State(state): State<AppState>) -> Json<Vec<DatasetInfo>> {
    Json(state.registry.datasets().list())
}

async fn remove_dataset(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<String> {
    state.registry.datasets().remove(&name)?;
    Ok(Json(format!("Dataset {name} was successfully deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryOptions;
    use crate::store::InMemoryModelStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let registry = ModelRegistry::new(Arc::new(InMemoryModelStore::new()), RegistryOptions::default());
        registry.seed_predefined().unwrap();
        router(AppState::new(Arc::new(registry)))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri).header("content-type", "application/json");
        let req = match body {
            Some(v) => req.body(Body::from(v.to_string())).unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn lists_seeded_models() {
        let (status, body) = call(&app(), "GET", "/models", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([{"model_id": 0, "model": "Ridge"}, {"model_id": 1, "model": "RandomForestRegressor"}])
        );
    }

    #[tokio::test]
    async fn create_reports_new_id() {
        let app = app();
        let (status, body) = call(&app, "POST", "/models", Some(json!({"model_type": "ridge"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("Added new model with model_id=2"));

        let (status, body) = call(&app, "POST", "/models", Some(json!({"model_type": "gachi"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.as_str().unwrap().contains("Incorrect type of model"));
    }

    #[tokio::test]
    async fn statuses_follow_error_kind() {
        let app = app();
        assert_eq!(call(&app, "GET", "/models/77", None).await.0, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "PUT", "/models/0/predict", Some(json!({"data": [[1.0]]}))).await;
        assert_eq!(status, StatusCode::FAILED_DEPENDENCY);
        let (status, _) = call(&app, "PUT", "/models/0", Some(json!({"params": {"alpha": -1.0}}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, "PUT", "/models/0/fit", Some(json!({"train_data": "[[1]]", "target": [1]}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, "PUT", "/models/0/fit", Some(json!({"data": [[1]]}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, "PUT", "/models/0/validate", Some(json!({"dataset": "nope"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fit_then_predict() {
        let app = app();
        let fit = json!({"train_data": [[1], [2], [5]], "target": [1, 3, 8]});
        let (status, body) = call(&app, "PUT", "/models/0/fit", Some(fit)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "Fitted on train data", "RMSE on train": 0.3247}));

        let (status, body) = call(&app, "PUT", "/models/0/predict", Some(json!({"data": [[2]]}))).await;
        assert_eq!(status, StatusCode::OK);
        let y = body["y_pred"][0].as_f64().unwrap();
        assert!((y - 2.965517).abs() < 1e-5);
    }

    #[tokio::test]
    async fn delete_predefined_resets() {
        let app = app();
        let (status, body) = call(&app, "DELETE", "/models/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_str().unwrap().contains("RandomForestRegressor"));
        assert_eq!(call(&app, "GET", "/models/1", None).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn dataset_routes() {
        let app = app();
        let load = json!({"name": "tiny", "target_column": "y", "csv": "x,y\n1,1\n2,3\n5,8\n"});
        let (status, body) = call(&app, "POST", "/datasets", Some(load)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rows"], json!(3));

        let (status, body) = call(&app, "PUT", "/models/0/fit_dataset", Some(json!({"dataset": "tiny"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["RMSE on train"], json!(0.3247));
        let (status, body) = call(&app, "PUT", "/models/0/validate", Some(json!({"dataset": "tiny"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"RMSE on dataset": 0.3247}));

        assert_eq!(call(&app, "DELETE", "/datasets/tiny", None).await.0, StatusCode::OK);
        assert_eq!(call(&app, "DELETE", "/datasets/tiny", None).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_routes_are_mounted() {
        assert_eq!(call(&app(), "GET", "/live", None).await.0, StatusCode::OK);
    }
}
