use std::sync::Arc;

use super::encoder::{encode, EncodedRow, RawInput};
use super::error::EstimatorError;
use super::model::Model;
use super::predictor::predict;
use super::schema::{FeatureSchema, MONTH_CODES, MONTH_GROUP, TARIFF_CLASSES, TARIFF_GROUP};

/// Estimates monthly electricity bills with a trained regression model.
///
/// # Thread Safety
///
/// The estimator holds only `Arc`s to immutable data, so it is `Send + Sync`
/// and can be shared across threads.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use tagihan::{BillEstimator, RawInput, format_rupiah};
///
/// let estimator = BillEstimator::builder()
///     .with_model_path("linear_regression_model.json")?
///     .build()?;
///
/// let bill = estimator.estimate(&RawInput::default())?;
/// println!("{}", format_rupiah(bill));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BillEstimator {
    pub(crate) model: Arc<Model>,
    pub(crate) schema: Arc<FeatureSchema>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<BillEstimator>();
    }
};

impl BillEstimator {
    /// Creates a new EstimatorBuilder for fluent construction
    pub fn builder() -> super::builder::EstimatorBuilder {
        super::builder::EstimatorBuilder::new()
    }

    /// Returns information about the loaded model and the feature layout
    pub fn info(&self) -> super::EstimatorInfo {
        super::EstimatorInfo {
            model_path: self.model.path().to_string_lossy().to_string(),
            model_format: self.model.format(),
            model_sha256: self.model.sha256().to_string(),
            num_features: self.schema.len(),
            feature_names: self.schema.column_names().map(str::to_string).collect(),
            baseline_months: to_strings(self.schema.baseline_levels(MONTH_GROUP, &MONTH_CODES)),
            baseline_tariffs: to_strings(self.schema.baseline_levels(TARIFF_GROUP, &TARIFF_CLASSES)),
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Encodes `raw` against this estimator's schema without predicting
    pub fn encode(&self, raw: &RawInput) -> EncodedRow<'_> {
        encode(raw, &self.schema)
    }

    /// Estimates the monthly bill for one set of parameters.
    ///
    /// Input bounds are not checked here; call [`RawInput::validate`] first
    /// when the values come straight from a user.
    pub fn estimate(&self, raw: &RawInput) -> Result<f64, EstimatorError> {
        let row = self.encode(raw);
        predict(&self.model, &row)
    }
}

fn to_strings(levels: Vec<&str>) -> Vec<String> {
    levels.into_iter().map(str::to_string).collect()
}
