use std::fmt;
use std::ops::RangeInclusive;

use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::error::EstimatorError;
use super::schema::{split_indicator, ColumnSpec, FeatureSchema, ScalarType, MONTH_CODES, MONTH_GROUP, TARIFF_CLASSES, TARIFF_GROUP};

pub const KWH_RANGE: RangeInclusive<f64> = 150.0..=600.0;
pub const AC_UNITS_RANGE: RangeInclusive<i64> = 0..=3;
pub const AC_HOURS_RANGE: RangeInclusive<f64> = 0.0..=10.0;
pub const FAMILY_SIZE_RANGE: RangeInclusive<i64> = 2..=6;

/// The parameters a user supplies for one bill estimate.
///
/// Missing fields fall back to the input form's initial values when
/// deserialized, so `{"kwh": 410.0}` is a complete request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawInput {
    /// Monthly consumption in kWh
    pub kwh: f64,
    /// Number of air conditioners in the household
    pub ac_units: i64,
    /// Average air conditioner running hours per day
    pub ac_hours_per_day: f64,
    /// Number of people in the household
    pub family_size: i64,
    /// Three-letter billing month code (`Jan` .. `Dec`)
    pub month_name: String,
    /// Tariff class code (`R1`, `R2` or `R3`)
    pub tariff_class: String,
}

impl Default for RawInput {
    fn default() -> Self {
        Self {
            kwh: 350.0,
            ac_units: 1,
            ac_hours_per_day: 5.0,
            family_size: 4,
            month_name: "Jan".to_string(),
            tariff_class: "R1".to_string(),
        }
    }
}

impl RawInput {
    /// Checks every field against the bounds the input form allows.
    ///
    /// The encoder does not call this; it accepts anything. Input surfaces
    /// call it before asking for an estimate.
    ///
    /// # Errors
    /// - `ValidationError` naming the first field that is out of bounds or
    ///   holds an unknown category code
    pub fn validate(&self) -> Result<(), EstimatorError> {
        check_range("kwh", self.kwh, &KWH_RANGE)?;
        check_range("ac_units", self.ac_units, &AC_UNITS_RANGE)?;
        check_range("ac_hours_per_day", self.ac_hours_per_day, &AC_HOURS_RANGE)?;
        check_range("family_size", self.family_size, &FAMILY_SIZE_RANGE)?;

        if !MONTH_CODES.contains(&self.month_name.as_str()) {
            return Err(EstimatorError::ValidationError(format!(
                "Unknown month '{}' (expected one of {})",
                self.month_name,
                MONTH_CODES.join(", ")
            )));
        }
        if !TARIFF_CLASSES.contains(&self.tariff_class.as_str()) {
            return Err(EstimatorError::ValidationError(format!(
                "Unknown tariff class '{}' (expected one of {})",
                self.tariff_class,
                TARIFF_CLASSES.join(", ")
            )));
        }
        Ok(())
    }

    fn direct_fields(&self) -> [(&'static str, DirectValue); 4] {
        [
            ("kwh", DirectValue::Measure(self.kwh)),
            ("ac_units", DirectValue::Count(self.ac_units)),
            ("ac_hours_per_day", DirectValue::Measure(self.ac_hours_per_day)),
            ("family_size", DirectValue::Count(self.family_size)),
        ]
    }
}

/// A direct field as the user supplied it, before column coercion.
#[derive(Debug, Clone, Copy)]
enum DirectValue {
    Measure(f64),
    Count(i64),
}

impl DirectValue {
    fn coerce(self, scalar_type: ScalarType) -> FeatureValue {
        match self {
            Self::Measure(v) => FeatureValue::coerce(scalar_type, v),
            Self::Count(v) => FeatureValue::coerce_count(scalar_type, v),
        }
    }
}

fn check_range<T>(field: &str, value: T, range: &RangeInclusive<T>) -> Result<(), EstimatorError>
where
    T: PartialOrd + fmt::Display,
{
    // NaN fails `contains` as well
    if range.contains(&value) {
        Ok(())
    } else {
        Err(EstimatorError::ValidationError(format!(
            "{} must be between {} and {}, got {}",
            field,
            range.start(),
            range.end(),
            value
        )))
    }
}

/// A single typed cell of an encoded row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Float(f64),
    Integer(i64),
    Flag(bool),
}

impl FeatureValue {
    /// The zero value of a column type: `0.0`, `0` or `false`.
    pub fn zero(scalar_type: ScalarType) -> Self {
        match scalar_type {
            ScalarType::Float => Self::Float(0.0),
            ScalarType::Integer => Self::Integer(0),
            ScalarType::Flag => Self::Flag(false),
        }
    }

    /// Converts a raw number into the column's declared type.
    ///
    /// Integer columns truncate toward zero and saturate at the `i64` bounds
    /// (NaN becomes 0); flag columns are true for any non-zero value.
    pub fn coerce(scalar_type: ScalarType, value: f64) -> Self {
        match scalar_type {
            ScalarType::Float => Self::Float(value),
            ScalarType::Integer => Self::Integer(value.trunc() as i64),
            ScalarType::Flag => Self::Flag(value != 0.0 && !value.is_nan()),
        }
    }

    /// Converts a whole-number input to `scalar_type` without passing
    /// through `f64`, so integer columns keep every bit.
    pub fn coerce_count(scalar_type: ScalarType, value: i64) -> Self {
        match scalar_type {
            ScalarType::Float => Self::Float(value as f64),
            ScalarType::Integer => Self::Integer(value),
            ScalarType::Flag => Self::Flag(value != 0),
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Float(_) => ScalarType::Float,
            Self::Integer(_) => ScalarType::Integer,
            Self::Flag(_) => ScalarType::Flag,
        }
    }

    /// Numeric value handed to the model; flags become 1.0 / 0.0.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Float(v) => v,
            Self::Integer(v) => v as f64,
            Self::Flag(v) => if v { 1.0 } else { 0.0 },
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Flag(v) => write!(f, "{}", v),
        }
    }
}

/// One model input row, laid out exactly as its schema declares.
///
/// Rows only come out of [`encode`] and cannot be modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRow<'s> {
    schema: &'s FeatureSchema,
    values: Vec<FeatureValue>,
}

impl<'s> EncodedRow<'s> {
    pub fn schema(&self) -> &'s FeatureSchema {
        self.schema
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the named column.
    pub fn get(&self, name: &str) -> Option<FeatureValue> {
        self.schema.position(name).and_then(|i| self.values.get(i).copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ColumnSpec, &FeatureValue)> {
        self.schema.columns().iter().zip(self.values.iter())
    }

    /// True when the row has one value per schema column, each of the
    /// column's declared type.
    pub fn conforms(&self) -> bool {
        self.values.len() == self.schema.len()
            && self.iter().all(|(column, value)| value.scalar_type() == column.scalar_type)
    }

    /// Levels of `group` whose indicator is set.
    pub fn active_levels(&self, group: &str) -> Vec<&str> {
        self.iter()
            .filter(|(_, value)| matches!(value, FeatureValue::Flag(true)))
            .filter_map(|(column, _)| {
                split_indicator(&column.name)
                    .filter(|(prefix, _)| *prefix == group)
                    .map(|(_, level)| level)
            })
            .collect()
    }

    /// The row as a `1 x n` design matrix.
    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((1, self.values.len()), |(_, j)| self.values[j].as_f64())
    }
}

/// Encodes raw user input into the row layout of `schema`.
///
/// Every column starts at its zero value. The four direct fields are copied
/// in with coercion to their column types, then at most one month indicator
/// and at most one tariff indicator are set. A baseline level, an unknown
/// code, or a direct field whose column the schema lacks leaves the
/// corresponding columns at zero. This function never fails.
///
/// ```
/// use tagihan::{encode, FeatureSchema, FeatureValue, RawInput};
///
/// let raw = RawInput { month_name: "Jul".into(), ..RawInput::default() };
/// let row = encode(&raw, FeatureSchema::shared());
/// assert_eq!(row.get("month_name_Jul"), Some(FeatureValue::Flag(true)));
/// assert_eq!(row.get("ac_units"), Some(FeatureValue::Integer(1)));
/// ```
pub fn encode<'s>(raw: &RawInput, schema: &'s FeatureSchema) -> EncodedRow<'s> {
    let mut values: Vec<FeatureValue> = schema
        .columns()
        .iter()
        .map(|c| FeatureValue::zero(c.scalar_type))
        .collect();

    for (name, value) in raw.direct_fields() {
        match schema.position(name) {
            Some(i) => values[i] = value.coerce(schema.columns()[i].scalar_type),
            None => debug!("Schema has no '{}' column, leaving it out", name),
        }
    }

    for (group, level) in [(MONTH_GROUP, &raw.month_name), (TARIFF_GROUP, &raw.tariff_class)] {
        match schema.indicator(group, level) {
            Some(i) => values[i] = FeatureValue::Flag(true),
            None => debug!("No indicator for {}={}, encoding as baseline", group, level),
        }
    }

    let row = EncodedRow { schema, values };
    debug_assert!(row.conforms());
    row
}
