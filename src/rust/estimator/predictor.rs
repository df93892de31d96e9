use log::debug;

use super::encoder::EncodedRow;
use super::error::EstimatorError;
use super::model::Model;

/// Runs `model` on exactly one encoded row and returns its scalar output.
///
/// Inference is deterministic, so nothing is retried.
///
/// # Errors
/// `PredictionError` if:
/// - the row does not conform to its own schema
/// - the model records feature names that differ from the row's columns
/// - the model expects a different number of columns
/// - the underlying model fails
/// - the model does not return exactly one value, or returns a non-finite one
pub fn predict(model: &Model, row: &EncodedRow<'_>) -> Result<f64, EstimatorError> {
    if !row.conforms() {
        return Err(EstimatorError::PredictionError(
            "Encoded row does not match its feature schema".into()
        ));
    }

    let regressor = model.regressor();
    if let Some(names) = regressor.feature_names() {
        check_feature_names(names, row)?;
    } else if let Some(n) = regressor.n_features() {
        if n != row.len() {
            return Err(EstimatorError::PredictionError(format!(
                "Row has {} features, but the model is expecting {}",
                row.len(),
                n
            )));
        }
    }

    let outputs = regressor.predict(&row.to_array())?;
    if outputs.len() != 1 {
        return Err(EstimatorError::PredictionError(format!(
            "Expected a single prediction, model returned {} values",
            outputs.len()
        )));
    }

    let value = outputs[0];
    if !value.is_finite() {
        return Err(EstimatorError::PredictionError(format!(
            "Model produced a non-finite prediction ({})",
            value
        )));
    }

    debug!("Predicted {} from {} features", value, row.len());
    Ok(value)
}

fn check_feature_names(fitted: &[String], row: &EncodedRow<'_>) -> Result<(), EstimatorError> {
    let schema = row.schema();
    if fitted.iter().map(String::as_str).eq(schema.column_names()) {
        return Ok(());
    }

    let unseen: Vec<&str> = schema
        .column_names()
        .filter(|name| !fitted.iter().any(|f| f.as_str() == *name))
        .collect();
    let missing: Vec<&str> = fitted
        .iter()
        .map(String::as_str)
        .filter(|name| schema.position(name).is_none())
        .collect();

    let mut message = String::from("The feature names should match those that were passed during fit.");
    if !unseen.is_empty() {
        message.push_str(&format!(" Feature names unseen at fit time: {}.", unseen.join(", ")));
    }
    if !missing.is_empty() {
        message.push_str(&format!(" Feature names seen at fit time, yet now missing: {}.", missing.join(", ")));
    }
    if unseen.is_empty() && missing.is_empty() {
        message.push_str(" Feature names must be in the same order as they were in fit.");
    }
    Err(EstimatorError::PredictionError(message))
}
