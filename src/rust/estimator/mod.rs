mod error;
mod schema;
mod encoder;
mod model;
mod predictor;
mod estimator;
mod batch;
pub mod builder;
mod utils;

pub use error::EstimatorError;
pub use schema::{ColumnSpec, FeatureSchema, ScalarType, MONTH_CODES, MONTH_GROUP, TARIFF_CLASSES, TARIFF_GROUP};
pub use encoder::{encode, EncodedRow, FeatureValue, RawInput, AC_HOURS_RANGE, AC_UNITS_RANGE, FAMILY_SIZE_RANGE, KWH_RANGE};
pub use model::{LinearModel, Model, ModelFormat, OnnxElement, OnnxModel, Regressor};
pub use predictor::predict;
pub use estimator::BillEstimator;
pub use batch::{parse_record, BatchEstimates, BatchRecord};
pub use builder::EstimatorBuilder;
pub use utils::format_rupiah;

/// Information about a built estimator and the model behind it
#[derive(Debug, Clone)]
pub struct EstimatorInfo {
    /// Path the model artifact was loaded from
    pub model_path: String,
    /// Artifact format
    pub model_format: ModelFormat,
    /// SHA-256 of the artifact bytes
    pub model_sha256: String,
    /// Number of input columns
    pub num_features: usize,
    /// Input columns in model order
    pub feature_names: Vec<String>,
    /// Months encoded as "no flag set"
    pub baseline_months: Vec<String>,
    /// Tariff classes encoded as "no flag set"
    pub baseline_tariffs: Vec<String>,
}
