use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::{Array1, Array2};
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{Tensor, ValueType};
use serde::{Deserialize, Serialize};

use super::error::EstimatorError;
use crate::model_manager::{sha256_hex, ModelError};
use crate::runtime::{create_session_builder, RuntimeConfig};

/// The inference capability every bill model exposes.
///
/// Implementations take a `rows x features` design matrix and return one
/// prediction per row. They must be shareable across threads because loaded
/// models live in a [`ModelCache`](crate::ModelCache).
pub trait Regressor: Send + Sync + fmt::Debug {
    /// Column names the model was fitted on, in fit order, when the artifact
    /// records them.
    fn feature_names(&self) -> Option<&[String]>;

    /// Number of input columns, when the artifact records it.
    fn n_features(&self) -> Option<usize>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, EstimatorError>;
}

/// An ordinary least squares model stored as JSON.
///
/// ```json
/// { "feature_names": ["kwh", "ac_units"], "coefficients": [1444.5, 25000.0], "intercept": 10000.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearModel {
    /// Creates a linear model from per-feature coefficients and an intercept.
    ///
    /// # Errors
    /// Returns a description of the problem if the model has no features,
    /// the name and coefficient counts differ, or any parameter is not finite.
    pub fn new(
        feature_names: Vec<impl Into<String>>,
        coefficients: Vec<f64>,
        intercept: f64,
    ) -> Result<Self, String> {
        let model = Self {
            feature_names: feature_names.into_iter().map(Into::into).collect(),
            coefficients,
            intercept,
        };
        model.validate()?;
        Ok(model)
    }

    /// Parses and validates a JSON artifact.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, String> {
        let model: Self = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        model.validate()?;
        Ok(model)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    fn validate(&self) -> Result<(), String> {
        if self.coefficients.is_empty() {
            return Err("model has no coefficients".into());
        }
        if self.feature_names.len() != self.coefficients.len() {
            return Err(format!(
                "{} feature names but {} coefficients",
                self.feature_names.len(),
                self.coefficients.len()
            ));
        }
        if let Some(pos) = self.coefficients.iter().position(|c| !c.is_finite()) {
            return Err(format!("coefficient for '{}' is not finite", self.feature_names[pos]));
        }
        if !self.intercept.is_finite() {
            return Err("intercept is not finite".into());
        }
        Ok(())
    }
}

impl Regressor for LinearModel {
    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, EstimatorError> {
        if x.ncols() != self.coefficients.len() {
            return Err(EstimatorError::PredictionError(format!(
                "X has {} features, but the model is expecting {} features as input",
                x.ncols(),
                self.coefficients.len()
            )));
        }
        let coefficients = Array1::from(self.coefficients.clone());
        Ok(x.dot(&coefficients) + self.intercept)
    }
}

/// Tensor element types a regression graph may take and produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnnxElement {
    Float32,
    Float64,
}

impl OnnxElement {
    fn from_value_type(value_type: &ValueType) -> Option<Self> {
        match value_type {
            ValueType::Tensor { ty: TensorElementType::Float32, .. } => Some(Self::Float32),
            ValueType::Tensor { ty: TensorElementType::Float64, .. } => Some(Self::Float64),
            _ => None,
        }
    }
}

/// A regression graph executed by ONNX Runtime.
///
/// The graph must take a single `[rows, features]` tensor of `float` or
/// `double` and yield the predictions as its first output. Both exporter
/// conventions for linear regressors are accepted; the input is converted to
/// whatever element type the graph declares.
#[derive(Debug)]
pub struct OnnxModel {
    session: Session,
    input_name: String,
    input_element: OnnxElement,
    output_element: OnnxElement,
    n_features: Option<usize>,
}

impl OnnxModel {
    /// Builds a session from serialized graph bytes.
    ///
    /// # Errors
    /// - `Corrupt` if the bytes are not a graph, the graph has no inputs or
    ///   outputs, or its first input/output is not a `float`/`double` tensor
    pub fn from_bytes(path: &Path, bytes: &[u8], config: &RuntimeConfig) -> Result<Self, ModelError> {
        let corrupt = |reason: String| ModelError::Corrupt { path: path.to_path_buf(), reason };

        let session = create_session_builder(config)?
            .commit_from_memory(bytes)
            .map_err(|e| corrupt(format!("invalid ONNX graph: {}", e)))?;

        let input = match session.inputs.first() {
            Some(input) => input,
            None => return Err(corrupt("ONNX graph has no inputs".into())),
        };
        let output = match session.outputs.first() {
            Some(output) => output,
            None => return Err(corrupt("ONNX graph has no outputs".into())),
        };

        let input_name = input.name.clone();
        let input_element = OnnxElement::from_value_type(&input.input_type).ok_or_else(|| {
            corrupt(format!("input '{}' must be a float or double tensor, found {:?}", input.name, input.input_type))
        })?;
        let output_element = OnnxElement::from_value_type(&output.output_type).ok_or_else(|| {
            corrupt(format!("output '{}' must be a float or double tensor, found {:?}", output.name, output.output_type))
        })?;
        // Symbolic or unknown widths are reported as non-positive
        let n_features = match &input.input_type {
            ValueType::Tensor { dimensions, .. } => dimensions
                .last()
                .filter(|&&d| d > 0)
                .map(|&d| d as usize),
            _ => None,
        };

        debug!(
            "ONNX graph input '{}' ({:?}, {:?} features), output {:?}",
            input_name, input_element, n_features, output_element
        );
        Ok(Self { session, input_name, input_element, output_element, n_features })
    }

    pub fn input_element(&self) -> OnnxElement {
        self.input_element
    }
}

impl Regressor for OnnxModel {
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, EstimatorError> {
        let mut input_tensors = HashMap::new();
        match self.input_element {
            OnnxElement::Float32 => {
                let input_dyn = x.mapv(|v| v as f32).into_dyn();
                let input = input_dyn.as_standard_layout();
                input_tensors.insert(self.input_name.as_str(), Tensor::from_array(&input)?.into_dyn());
            }
            OnnxElement::Float64 => {
                let input_dyn = x.clone().into_dyn();
                let input = input_dyn.as_standard_layout();
                input_tensors.insert(self.input_name.as_str(), Tensor::from_array(&input)?.into_dyn());
            }
        }

        let outputs = self.session.run(input_tensors)?;
        let predictions = match self.output_element {
            OnnxElement::Float32 => outputs[0]
                .try_extract_tensor::<f32>()?
                .iter()
                .map(|&v| f64::from(v))
                .collect(),
            OnnxElement::Float64 => outputs[0]
                .try_extract_tensor::<f64>()?
                .iter()
                .copied()
                .collect(),
        };
        Ok(predictions)
    }
}

/// On-disk artifact formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    LinearJson,
    Onnx,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("onnx") => Self::Onnx,
            _ => Self::LinearJson,
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinearJson => f.write_str("linear-json"),
            Self::Onnx => f.write_str("onnx"),
        }
    }
}

/// A loaded, immutable bill model together with where it came from.
#[derive(Debug)]
pub struct Model {
    path: PathBuf,
    format: ModelFormat,
    sha256: String,
    regressor: Box<dyn Regressor>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Model>();
    }
};

impl Model {
    /// Reads and deserializes a model artifact.
    ///
    /// # Errors
    /// - `NotFound` if `path` is not an existing file
    /// - `IoError` if the file cannot be read
    /// - `Corrupt` if the contents are not a valid model of the format the
    ///   extension implies
    /// - `Runtime` / `RuntimeInit` if ONNX Runtime cannot start
    pub fn from_file(path: &Path, config: &RuntimeConfig) -> Result<Self, ModelError> {
        if !path.is_file() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path)?;
        let sha256 = sha256_hex(&bytes);
        let format = ModelFormat::from_path(path);
        info!("Loading {} model from {:?} ({} bytes, sha256 {})", format, path, bytes.len(), sha256);

        let regressor: Box<dyn Regressor> = match format {
            ModelFormat::LinearJson => Box::new(
                LinearModel::from_json_slice(&bytes).map_err(|reason| ModelError::Corrupt {
                    path: path.to_path_buf(),
                    reason,
                })?,
            ),
            ModelFormat::Onnx => Box::new(OnnxModel::from_bytes(path, &bytes, config)?),
        };

        Ok(Self { path: path.to_path_buf(), format, sha256, regressor })
    }

    /// Wraps an in-memory linear model, e.g. one built for tests or benchmarks.
    pub fn from_linear(model: LinearModel) -> Self {
        let sha256 = match model.to_json() {
            Ok(json) => sha256_hex(json.as_bytes()),
            Err(_) => String::new(),
        };
        Self {
            path: PathBuf::from("<memory>"),
            format: ModelFormat::LinearJson,
            sha256,
            regressor: Box::new(model),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ModelFormat {
        self.format
    }

    /// Lowercase hex SHA-256 of the artifact bytes.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn regressor(&self) -> &dyn Regressor {
        self.regressor.as_ref()
    }
}
