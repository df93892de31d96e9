use std::io::{self, BufRead};
use std::iter::Enumerate;

use log::debug;

use super::encoder::RawInput;
use super::error::EstimatorError;
use super::estimator::BillEstimator;

/// Outcome of one non-blank line of a batch input.
#[derive(Debug)]
pub struct BatchRecord {
    /// 1-based line number in the input
    pub line: usize,
    pub result: Result<f64, EstimatorError>,
}

/// Parses one JSON line into a [`RawInput`].
///
/// # Errors
/// - `ValidationError` if the line is not a JSON object of input fields
pub fn parse_record(line: &str) -> Result<RawInput, EstimatorError> {
    serde_json::from_str(line)
        .map_err(|e| EstimatorError::ValidationError(format!("Not a valid input record: {}", e)))
}

/// Iterator over the estimates of a JSON-lines reader.
///
/// Yields `Err` only when the reader itself fails; a line that cannot be
/// parsed, validated or estimated becomes a record with an error result and
/// iteration continues.
pub struct BatchEstimates<'e, R> {
    estimator: &'e BillEstimator,
    lines: Enumerate<io::Lines<R>>,
}

impl<R: BufRead> Iterator for BatchEstimates<'_, R> {
    type Item = io::Result<BatchRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (i, line) = self.lines.next()?;
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            if line.trim().is_empty() {
                continue;
            }

            let result = parse_record(&line).and_then(|raw| {
                raw.validate()?;
                self.estimator.estimate(&raw)
            });
            if let Err(e) = &result {
                debug!("Line {} failed: {}", i + 1, e);
            }
            return Some(Ok(BatchRecord { line: i + 1, result }));
        }
    }
}

impl BillEstimator {
    /// Estimates every non-blank JSON line of `reader`.
    ///
    /// Each line is a [`RawInput`] object (missing fields take their
    /// defaults) and is validated before it is estimated.
    ///
    /// ```no_run
    /// use std::io::Cursor;
    /// use tagihan::BillEstimator;
    ///
    /// let estimator = BillEstimator::builder()
    ///     .with_model_path("linear_regression_model.json")?
    ///     .build()?;
    /// let input = Cursor::new("{\"kwh\": 410.0}\n{\"month_name\": \"Jul\"}\n");
    /// for record in estimator.estimate_lines(input) {
    ///     let record = record?;
    ///     println!("{}: {:?}", record.line, record.result);
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn estimate_lines<R: BufRead>(&self, reader: R) -> BatchEstimates<'_, R> {
        BatchEstimates { estimator: self, lines: reader.lines().enumerate() }
    }
}
