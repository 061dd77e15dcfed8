use modelhub_estimators::EstimatorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no stored model with model_id={0}")]
    NotFound(u64),

    #[error("storage backend: {0}")]
    Backend(#[from] sled::Error),

    #[error("storage transaction aborted")]
    Aborted,

    #[error("corrupt row for model_id={id}: {reason}")]
    Corrupt { id: u64, reason: String },
}

/// Registry failures. Each variant maps to one HTTP status in the API layer.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Incorrect model_id specified, model with model_id={0} not found")]
    NotFound(u64),

    #[error("Dataset {0:?} not found")]
    DatasetNotFound(String),

    #[error("Incorrect type of model {0:?}, please choose one of these types: [ridge, random_forest]")]
    InvalidType(String),

    #[error("Incorrect hyperparameters: {0}")]
    InvalidParameter(String),

    #[error("Incorrect data format, must be list of list with floats or integers: {0}")]
    MalformedInput(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Model with model_id={0} is not fitted yet, call fit before predict")]
    NotFitted(u64),

    #[error("Model could not be fitted: {0}")]
    FitFailed(String),

    #[error("stored state of model_id={id} cannot be decoded: {reason}")]
    Corrupt { id: u64, reason: String },

    #[error("storage failure: {0}")]
    Store(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::NotFound(_) => "not_found",
            RegistryError::DatasetNotFound(_) => "dataset_not_found",
            RegistryError::InvalidType(_) => "invalid_type",
            RegistryError::InvalidParameter(_) => "invalid_parameter",
            RegistryError::MalformedInput(_) => "malformed_input",
            RegistryError::ShapeMismatch(_) => "shape_mismatch",
            RegistryError::NotFitted(_) => "not_fitted",
            RegistryError::FitFailed(_) => "fit_failed",
            RegistryError::Corrupt { .. } => "corrupt",
            RegistryError::Store(_) => "store",
            RegistryError::Internal(_) => "internal",
        }
    }

    /// Translates an estimator failure for model `id`.
    pub(crate) fn from_estimator(id: u64, err: EstimatorError) -> Self {
        match err {
            EstimatorError::NotFitted => RegistryError::NotFitted(id),
            EstimatorError::Shape(msg) => RegistryError::ShapeMismatch(msg),
            EstimatorError::InvalidParameter(msg) => RegistryError::InvalidParameter(msg),
            EstimatorError::Numerical(msg) => RegistryError::FitFailed(msg),
            EstimatorError::UnknownKind(kind) => RegistryError::InvalidType(kind),
            EstimatorError::Encoding(e) => RegistryError::Corrupt { id, reason: e.to_string() },
        }
    }
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => RegistryError::NotFound(id),
            StoreError::Corrupt { id, reason } => RegistryError::Corrupt { id, reason },
            other => RegistryError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_becomes_registry_not_found() {
        let err: RegistryError = StoreError::NotFound(7).into();
        assert!(matches!(err, RegistryError::NotFound(7)));
    }

    #[test]
    fn estimator_not_fitted_carries_model_id() {
        let err = RegistryError::from_estimator(3, EstimatorError::NotFitted);
        assert!(matches!(err, RegistryError::NotFitted(3)));
        assert_eq!(err.kind(), "not_fitted");
    }
}
