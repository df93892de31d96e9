//! Monthly household electricity bill estimation from a trained linear regression model.
//!
//! The crate turns a handful of user parameters (consumption, air conditioner
//! usage, household size, billing month, tariff class) into the exact feature
//! row the model was trained on, runs the model, and formats the result.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use tagihan::{BillEstimator, RawInput, format_rupiah};
//!
//! let estimator = BillEstimator::builder()
//!     .with_model_path("linear_regression_model.json")?
//!     .build()?;
//!
//! let input = RawInput {
//!     kwh: 420.0,
//!     month_name: "Jul".into(),
//!     tariff_class: "R2".into(),
//!     ..RawInput::default()
//! };
//! input.validate()?;
//!
//! let bill = estimator.estimate(&input)?;
//! println!("Predicted bill: {}", format_rupiah(bill));
//! # Ok(())
//! # }
//! ```
//!
//! # Model caching
//!
//! Models are loaded through a [`ModelCache`]. Sharing one cache between
//! builders means each artifact path is read and deserialized once:
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use tagihan::{BillEstimator, ModelCache};
//!
//! let cache = Arc::new(ModelCache::new());
//! let first = BillEstimator::builder()
//!     .with_cache(Arc::clone(&cache))
//!     .with_model_path(ModelCache::default_model_path())?
//!     .build()?;
//! let second = BillEstimator::builder()
//!     .with_cache(Arc::clone(&cache))
//!     .with_model_path(ModelCache::default_model_path())?
//!     .build()?;
//! assert!(Arc::ptr_eq(first.model(), second.model()));
//! # Ok(())
//! # }
//! ```

pub mod estimator;
mod runtime;
pub mod model_manager;

pub use estimator::{
    encode, format_rupiah, parse_record, predict, BatchEstimates, BatchRecord, BillEstimator,
    ColumnSpec, EncodedRow, EstimatorBuilder, EstimatorError, EstimatorInfo, FeatureSchema,
    FeatureValue, LinearModel, Model, ModelFormat, OnnxElement, OnnxModel, RawInput, Regressor,
    ScalarType, MONTH_CODES, MONTH_GROUP, TARIFF_CLASSES, TARIFF_GROUP,
};
pub use runtime::{RuntimeConfig, create_session_builder};
pub use model_manager::{ModelCache, ModelError, DEFAULT_MODEL_FILE, MODEL_PATH_ENV};

pub fn init_logger() {
    env_logger::init();
}
