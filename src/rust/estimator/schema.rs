use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

use super::error::EstimatorError;

/// Column-name prefix of the month indicator group.
pub const MONTH_GROUP: &str = "month_name";
/// Column-name prefix of the tariff indicator group.
pub const TARIFF_GROUP: &str = "tariff_class";

/// Indicator groups a flag column can belong to.
const INDICATOR_GROUPS: [&str; 2] = [MONTH_GROUP, TARIFF_GROUP];

/// Splits `<group>_<level>` for a known group prefix; the level may itself
/// contain underscores.
pub(crate) fn split_indicator(name: &str) -> Option<(&'static str, &str)> {
    INDICATOR_GROUPS.iter().find_map(|&group| {
        name.strip_prefix(group)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|level| !level.is_empty())
            .map(|level| (group, level))
    })
}

/// Every month code the input form offers, in calendar order.
pub const MONTH_CODES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Every tariff class the input form offers.
pub const TARIFF_CLASSES: [&str; 3] = ["R1", "R2", "R3"];

/// The scalar type of a single feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// 64-bit float (`float64` at training time)
    Float,
    /// 64-bit signed integer (`int64` at training time)
    Integer,
    /// Boolean indicator (`bool` at training time)
    Flag,
}

impl ScalarType {
    /// Name of the dtype the model was trained with.
    pub fn dtype(&self) -> &'static str {
        match self {
            Self::Float => "float64",
            Self::Integer => "int64",
            Self::Flag => "bool",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dtype())
    }
}

// Training-time column order. April and R1 are the dropped baseline levels.
const TRAINING_COLUMNS: [(&str, ScalarType); 17] = [
    ("kwh", ScalarType::Float),
    ("ac_units", ScalarType::Integer),
    ("ac_hours_per_day", ScalarType::Float),
    ("family_size", ScalarType::Integer),
    ("month_name_Aug", ScalarType::Flag),
    ("month_name_Dec", ScalarType::Flag),
    ("month_name_Feb", ScalarType::Flag),
    ("month_name_Jan", ScalarType::Flag),
    ("month_name_Jul", ScalarType::Flag),
    ("month_name_Jun", ScalarType::Flag),
    ("month_name_Mar", ScalarType::Flag),
    ("month_name_May", ScalarType::Flag),
    ("month_name_Nov", ScalarType::Flag),
    ("month_name_Oct", ScalarType::Flag),
    ("month_name_Sep", ScalarType::Flag),
    ("tariff_class_R2", ScalarType::Flag),
    ("tariff_class_R3", ScalarType::Flag),
];

lazy_static! {
    static ref TRAINING_SCHEMA: FeatureSchema = FeatureSchema::training();
}

/// A single named, typed column of the model input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub scalar_type: ScalarType,
}

/// The ordered set of columns a trained model expects as input.
///
/// Besides the columns themselves, the schema keeps two lookup tables built
/// once at construction: column name to position, and (group, level) to the
/// position of that level's indicator column. Flag columns named
/// `<group>_<level>` for the month or tariff group are indexed under that
/// group, so `month_name_Jul` becomes the `Jul` level of `month_name` and
/// `tariff_class_R2_subsidi` the `R2_subsidi` level of `tariff_class`.
///
/// ```
/// use tagihan::{FeatureSchema, MONTH_GROUP, TARIFF_GROUP};
///
/// let schema = FeatureSchema::shared();
/// assert_eq!(schema.len(), 17);
/// assert!(schema.indicator(MONTH_GROUP, "Jan").is_some());
/// assert!(schema.indicator(MONTH_GROUP, "Apr").is_none());
/// assert!(schema.indicator(TARIFF_GROUP, "R1").is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    columns: Vec<ColumnSpec>,
    positions: HashMap<String, usize>,
    indicators: HashMap<String, HashMap<String, usize>>,
}

impl FeatureSchema {
    /// Builds a schema from an ordered list of columns.
    ///
    /// # Errors
    /// - `ValidationError` if the list is empty, a name is empty, or a name
    ///   appears twice
    pub fn new<I, S>(columns: I) -> Result<Self, EstimatorError>
    where
        I: IntoIterator<Item = (S, ScalarType)>,
        S: Into<String>,
    {
        let columns: Vec<ColumnSpec> = columns
            .into_iter()
            .map(|(name, scalar_type)| ColumnSpec { name: name.into(), scalar_type })
            .collect();

        if columns.is_empty() {
            return Err(EstimatorError::ValidationError("Feature schema cannot be empty".into()));
        }
        if let Some(pos) = columns.iter().position(|c| c.name.is_empty()) {
            return Err(EstimatorError::ValidationError(
                format!("Column {} has an empty name", pos + 1)
            ));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(EstimatorError::ValidationError(
                    format!("Duplicate column '{}' in feature schema", column.name)
                ));
            }
        }

        Ok(Self::index(columns))
    }

    /// The column layout the bill model was trained with.
    pub fn training() -> Self {
        Self::index(
            TRAINING_COLUMNS
                .iter()
                .map(|&(name, scalar_type)| ColumnSpec { name: name.to_string(), scalar_type })
                .collect(),
        )
    }

    /// Process-wide instance of [`FeatureSchema::training`].
    pub fn shared() -> &'static FeatureSchema {
        &TRAINING_SCHEMA
    }

    fn index(columns: Vec<ColumnSpec>) -> Self {
        let mut positions = HashMap::with_capacity(columns.len());
        let mut indicators: HashMap<String, HashMap<String, usize>> = HashMap::new();

        for (i, column) in columns.iter().enumerate() {
            positions.insert(column.name.clone(), i);
            if column.scalar_type != ScalarType::Flag {
                continue;
            }
            if let Some((group, level)) = split_indicator(&column.name) {
                indicators
                    .entry(group.to_string())
                    .or_default()
                    .insert(level.to_string(), i);
            }
        }

        Self { columns, positions, indicators }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Position of the named column, if the schema has it.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Position of the indicator column for `level` within `group`.
    ///
    /// Returns `None` both for the group's baseline level and for levels the
    /// schema has never seen; callers treat either case as "no flag".
    pub fn indicator(&self, group: &str, level: &str) -> Option<usize> {
        self.indicators.get(group)?.get(level).copied()
    }

    /// Levels from `levels` that have no indicator column in `group`.
    pub fn baseline_levels<'a>(&self, group: &str, levels: &[&'a str]) -> Vec<&'a str> {
        levels
            .iter()
            .copied()
            .filter(|level| self.indicator(group, level).is_none())
            .collect()
    }
}
