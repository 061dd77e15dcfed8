//! Error types for the estimator capability.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("this model instance is not fitted yet, call fit with appropriate arguments before predict")]
    NotFitted,

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error("incorrect type of model {0:?}, please choose one of these types: [ridge, random_forest]")]
    UnknownKind(String),

    #[error("model state encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EstimatorError>;
