use ort::Error as OrtError;
use std::error::Error as _;
use std::fmt;

use crate::model_manager::ModelError;

/// Represents the different types of errors that can occur while estimating a bill.
#[derive(Debug)]
pub enum EstimatorError {
    /// The model artifact could not be found, read or deserialized
    ModelError(ModelError),
    /// Error occurred while assembling an estimator
    BuildError(String),
    /// The model failed to produce a prediction for an encoded row
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
}

impl fmt::Display for EstimatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Shown verbatim so "Model file not found: ..." reaches the user unchanged
            Self::ModelError(err) => write!(f, "{}", err),
            Self::BuildError(msg) => write!(f, "Build error: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for EstimatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            // Display already forwards to the model error, so skip to its cause
            Self::ModelError(err) => err.source(),
            _ => None,
        }
    }
}

impl From<ModelError> for EstimatorError {
    fn from(err: ModelError) -> Self {
        EstimatorError::ModelError(err)
    }
}

// Inference-time failures from ONNX Runtime (tensor build, run, extract)
impl From<OrtError> for EstimatorError {
    fn from(err: OrtError) -> Self {
        EstimatorError::PredictionError(format!("ONNX Runtime: {}", err))
    }
}
