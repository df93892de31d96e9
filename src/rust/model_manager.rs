use std::collections::HashMap;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use sha2::{Sha256, Digest};
use log;

use crate::estimator::Model;
use crate::runtime::RuntimeConfig;

/// File name the bill model is looked up under when nothing else is configured.
pub const DEFAULT_MODEL_FILE: &str = "linear_regression_model.json";
/// Environment variable overriding [`DEFAULT_MODEL_FILE`].
pub const MODEL_PATH_ENV: &str = "TAGIHAN_MODEL_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Model file {} is corrupt: {reason}", .path.display())]
    Corrupt {
        path: PathBuf,
        reason: String,
    },
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        expected: String,
        actual: String,
    },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("ONNX Runtime error: {0}")]
    Runtime(#[from] ort::Error),
    #[error("ONNX Runtime failed to initialize: {0}")]
    RuntimeInit(String),
}

/// Memoizing model loader.
///
/// Each distinct path is read and deserialized at most once; later calls
/// hand out the same `Arc<Model>`. Entries are never invalidated, so a
/// changed file on disk is only picked up by a new cache. The lock is held
/// across a load, which keeps concurrent first requests for a path from
/// deserializing it twice.
#[derive(Debug, Default)]
pub struct ModelCache {
    models: Mutex<HashMap<PathBuf, Arc<Model>>>,
    runtime_config: RuntimeConfig,
}

impl ModelCache {
    /// Creates an empty cache with the default ONNX Runtime settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache whose ONNX sessions use `config`
    pub fn with_runtime_config(config: RuntimeConfig) -> Self {
        Self {
            models: Mutex::new(HashMap::new()),
            runtime_config: config,
        }
    }

    /// Returns the model path to use when none is given explicitly
    pub fn default_model_path() -> PathBuf {
        match env::var(MODEL_PATH_ENV) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_MODEL_FILE),
        }
    }

    /// Returns the cached model for `path`, loading it on first use.
    ///
    /// # Errors
    /// Propagates the load failure unchanged; failed loads are not cached,
    /// so a later call retries the file.
    pub fn get_or_load<P: AsRef<Path>>(&self, path: P) -> Result<Arc<Model>, ModelError> {
        let path = path.as_ref();
        // Entries are only inserted fully loaded, so a poisoned map is still consistent
        let mut models = self.models.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(model) = models.get(path) {
            log::debug!("Model cache hit for {:?}", path);
            return Ok(Arc::clone(model));
        }

        log::info!("Model cache miss for {:?}, loading", path);
        let model = match Model::from_file(path, &self.runtime_config) {
            Ok(model) => Arc::new(model),
            Err(e) => {
                log::error!("Failed to load model from {:?}: {}", path, e);
                return Err(e);
            }
        };
        models.insert(path.to_path_buf(), Arc::clone(&model));
        Ok(model)
    }

    pub fn is_cached<P: AsRef<Path>>(&self, path: P) -> bool {
        self.models
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.models.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lowercase hex SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Checks a loaded model's artifact digest against an expected hex digest.
pub fn verify_digest(model: &Model, expected: &str) -> Result<(), ModelError> {
    log::info!("Verifying model {:?}", model.path());
    log::info!("  Calculated hash: {}", model.sha256());
    log::info!("  Expected hash:   {}", expected);
    if model.sha256().eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(ModelError::HashMismatch {
            expected: expected.trim().to_lowercase(),
            actual: model.sha256().to_string(),
        })
    }
}
