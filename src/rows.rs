//! Tabular request payloads.
//!
//! ## Responsibility
//! Turn the `data` field of a prediction request into a [`FeatureFrame`]: an
//! ordered list of rows, each either a positional sequence of feature values
//! or a mapping from feature name to value.
//!
//! ## Accepted shapes
//! - `[[5.1, 3.5], [6.7, 3.0]]`: rows as sequences
//! - `[{"a": 5.1, "b": 3.5}]`: rows as mappings
//! - `[1.0, 2.0]`: one single-feature row per scalar
//! - `{"a": [5.1, 6.7], "b": [3.5, 3.0]}`: columns of equal length
//!
//! ## NOT Responsible For
//! - Checking feature counts or types against a model (the model does that)

use serde_json::{Map, Value};
use thiserror::Error;

/// A single input row.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureRow {
    /// Positional feature values.
    Values(Vec<Value>),
    /// Feature values keyed by name.
    Named(Map<String, Value>),
}

impl FeatureRow {
    fn shape(&self) -> &'static str {
        match self {
            Self::Values(_) => "a sequence",
            Self::Named(_) => "a mapping",
        }
    }
}

/// Errors raised when `data` cannot be read as a table.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    /// The top-level value is neither an array nor an object.
    #[error("data must be an array of rows or an object of columns, got {0}")]
    NotTabular(&'static str),

    /// Rows of different shapes were mixed in one payload.
    #[error("row {index} is {found} but row 0 is {expected}")]
    MixedRows {
        /// Index of the first offending row.
        index: usize,
        /// Shape established by the first row.
        expected: &'static str,
        /// Shape of the offending row.
        found: &'static str,
    },

    /// A column in column-oriented data is not an array.
    #[error("column '{column}' is not an array")]
    ColumnNotArray {
        /// Name of the offending column.
        column: String,
    },

    /// Columns in column-oriented data have different lengths.
    #[error("column '{column}' has {found} values, expected {expected}")]
    RaggedColumns {
        /// Name of the offending column.
        column: String,
        /// Length of the first column.
        expected: usize,
        /// Length of the offending column.
        found: usize,
    },
}

/// An ordered collection of input rows scored together by one model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    rows: Vec<FeatureRow>,
}

impl FeatureFrame {
    /// Parse the `data` field of a prediction request.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] if `data` has none of the accepted shapes.
    pub fn from_json(data: &Value) -> Result<Self, FrameError> {
        match data {
            Value::Array(items) => Self::from_records(items),
            Value::Object(columns) => Self::from_columns(columns),
            other => Err(FrameError::NotTabular(json_kind(other))),
        }
    }

    fn from_records(items: &[Value]) -> Result<Self, FrameError> {
        let mut rows = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let row = match item {
                Value::Array(values) => FeatureRow::Values(values.clone()),
                Value::Object(fields) => FeatureRow::Named(fields.clone()),
                scalar => FeatureRow::Values(vec![scalar.clone()]),
            };
            if let Some(first) = rows.first() {
                if std::mem::discriminant(first) != std::mem::discriminant(&row) {
                    return Err(FrameError::MixedRows {
                        index,
                        expected: FeatureRow::shape(first),
                        found: row.shape(),
                    });
                }
            }
            rows.push(row);
        }
        Ok(Self { rows })
    }

    fn from_columns(columns: &Map<String, Value>) -> Result<Self, FrameError> {
        let mut expected: Option<usize> = None;
        for (name, column) in columns {
            let Value::Array(values) = column else {
                return Err(FrameError::ColumnNotArray {
                    column: name.clone(),
                });
            };
            match expected {
                None => expected = Some(values.len()),
                Some(len) if len != values.len() => {
                    return Err(FrameError::RaggedColumns {
                        column: name.clone(),
                        expected: len,
                        found: values.len(),
                    });
                }
                Some(_) => {}
            }
        }

        let len = expected.unwrap_or(0);
        let rows = (0..len)
            .map(|i| {
                let fields = columns
                    .iter()
                    .filter_map(|(name, column)| {
                        column.get(i).map(|value| (name.clone(), value.clone()))
                    })
                    .collect();
                FeatureRow::Named(fields)
            })
            .collect();
        Ok(Self { rows })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// `true` when the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The rows in request order.
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
