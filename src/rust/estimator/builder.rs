use std::path::PathBuf;
use std::sync::Arc;
use log::{info, warn};

use super::error::EstimatorError;
use super::estimator::BillEstimator;
use super::model::Model;
use super::schema::FeatureSchema;
use crate::model_manager::{verify_digest, ModelCache};
use crate::runtime::RuntimeConfig;

/// A builder for constructing a BillEstimator with a fluent interface.
#[derive(Default, Debug)]
pub struct EstimatorBuilder {
    model_path: Option<PathBuf>,
    model: Option<Arc<Model>>,
    cache: Option<Arc<ModelCache>>,
    schema: Option<FeatureSchema>,
    expected_sha256: Option<String>,
    runtime_config: RuntimeConfig,
}

impl EstimatorBuilder {
    /// Creates a new empty EstimatorBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use tagihan::EstimatorBuilder;
    ///
    /// let builder = EstimatorBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the runtime configuration used for `.onnx` models.
    ///
    /// Only applies when no cache is supplied through
    /// [`with_cache`](Self::with_cache); a supplied cache loads with its own
    /// configuration.
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Sets the model artifact to load when building
    ///
    /// # Returns
    /// * `Result<Self, EstimatorError>` - The builder instance if successful, or an error if:
    ///   - The path is empty
    ///   - A model path or model is already set
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Result<Self, EstimatorError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(EstimatorError::BuildError("Model path cannot be empty".to_string()));
        }
        if self.model_path.is_some() || self.model.is_some() {
            return Err(EstimatorError::BuildError("Model already set".to_string()));
        }
        self.model_path = Some(path);
        Ok(self)
    }

    /// Uses an already loaded model instead of reading one from disk
    pub fn with_model(mut self, model: Arc<Model>) -> Result<Self, EstimatorError> {
        if self.model_path.is_some() || self.model.is_some() {
            return Err(EstimatorError::BuildError("Model already set".to_string()));
        }
        self.model = Some(model);
        Ok(self)
    }

    /// Loads the model through a shared cache, so estimators built for the
    /// same path share one model instance
    pub fn with_cache(mut self, cache: Arc<ModelCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Overrides the training-time feature schema
    pub fn with_schema(mut self, schema: FeatureSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Requires the model artifact to have this SHA-256 digest (hex)
    pub fn with_expected_sha256(mut self, digest: impl Into<String>) -> Self {
        self.expected_sha256 = Some(digest.into());
        self
    }

    /// Builds and returns the final BillEstimator instance
    ///
    /// # Returns
    /// * `Result<BillEstimator, EstimatorError>` - The constructed estimator if successful, or an error if:
    ///   - Neither a model path nor a model is set
    ///   - The model cannot be loaded (`ModelError::NotFound`, `ModelError::Corrupt`, ...)
    ///   - The artifact digest differs from the expected one
    pub fn build(self) -> Result<BillEstimator, EstimatorError> {
        let model = match (self.model, self.model_path) {
            (Some(model), _) => model,
            (None, Some(path)) => {
                let cache = self
                    .cache
                    .unwrap_or_else(|| Arc::new(ModelCache::with_runtime_config(self.runtime_config)));
                cache.get_or_load(&path)?
            }
            (None, None) => {
                return Err(EstimatorError::BuildError("Model path must be set".to_string()));
            }
        };

        if let Some(expected) = &self.expected_sha256 {
            verify_digest(&model, expected)?;
        }

        let schema = self.schema.unwrap_or_else(|| FeatureSchema::shared().clone());
        if let Some(names) = model.regressor().feature_names() {
            if !names.iter().map(String::as_str).eq(schema.column_names()) {
                warn!(
                    "Model {:?} was fitted on different features than the schema provides; predictions will fail",
                    model.path()
                );
            }
        }

        info!("Estimator ready: {} model with {} features", model.format(), schema.len());
        Ok(BillEstimator {
            model,
            schema: Arc::new(schema),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{LinearModel, ScalarType};
    use crate::model_manager::ModelError;

    fn tiny_model() -> Arc<Model> {
        Arc::new(Model::from_linear(
            LinearModel::new(vec!["kwh"], vec![1000.0], 0.0).unwrap()
        ))
    }

    #[test]
    fn test_path_validation() {
        assert!(EstimatorBuilder::new().with_model_path("").is_err());
        assert!(EstimatorBuilder::new()
            .with_model_path("a.json").unwrap()
            .with_model_path("b.json")
            .is_err());
        assert!(EstimatorBuilder::new()
            .with_model(tiny_model()).unwrap()
            .with_model_path("b.json")
            .is_err());
    }

    #[test]
    fn test_build_requires_model() {
        let err = EstimatorBuilder::new().build().unwrap_err();
        assert!(matches!(err, EstimatorError::BuildError(_)));
    }

    #[test]
    fn test_custom_schema() {
        let estimator = EstimatorBuilder::new()
            .with_model(tiny_model()).unwrap()
            .with_schema(FeatureSchema::new([("kwh", ScalarType::Float)]).unwrap())
            .build()
            .unwrap();
        let bill = estimator.estimate(&Default::default()).unwrap();
        assert_eq!(bill, 350_000.0);
    }

    #[test]
    fn test_digest_mismatch() {
        let err = EstimatorBuilder::new()
            .with_model(tiny_model()).unwrap()
            .with_expected_sha256("00")
            .build()
            .unwrap_err();
        assert!(matches!(err, EstimatorError::ModelError(ModelError::HashMismatch { .. })));

        let model = tiny_model();
        let digest = model.sha256().to_uppercase();
        assert!(EstimatorBuilder::new()
            .with_model(model).unwrap()
            .with_expected_sha256(digest)
            .with_schema(FeatureSchema::new([("kwh", ScalarType::Float)]).unwrap())
            .build()
            .is_ok());
    }
}
