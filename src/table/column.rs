//! Typed column storage

use super::Value;
use chrono::NaiveDate;

/// Column data, one vector per logical type.
///
/// Missing floats are stored as NaN, missing dates as `None` and missing text
/// as the empty string.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Date(Vec<Option<NaiveDate>>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Bool(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Date(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnData::Bool(_) => "bool",
            ColumnData::Int(_) => "int",
            ColumnData::Float(_) => "float",
            ColumnData::Date(_) => "date",
            ColumnData::Text(_) => "text",
        }
    }

    /// Value at `row`. Panics if `row` is out of bounds, like slice indexing.
    pub fn get(&self, row: usize) -> Value {
        match self {
            ColumnData::Bool(v) => Value::Bool(v[row]),
            ColumnData::Int(v) => Value::Int(v[row]),
            ColumnData::Float(v) => Value::Float(v[row]),
            ColumnData::Date(v) => v[row].map(Value::Date).unwrap_or(Value::Null),
            ColumnData::Text(v) => Value::Text(v[row].clone()),
        }
    }

    /// Numeric copy of the column, or `None` for non-numeric columns
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match self {
            ColumnData::Bool(v) => Some(v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()),
            ColumnData::Int(v) => Some(v.iter().map(|&i| i as f64).collect()),
            ColumnData::Float(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Build a column from loose values.
    ///
    /// The type is taken from the non-null values when they all agree; mixed
    /// columns fall back to text.
    pub fn from_values(values: Vec<Value>) -> ColumnData {
        let first = values.iter().find(|v| !v.is_null());
        let uniform = first.is_some_and(|f| {
            values
                .iter()
                .filter(|v| !v.is_null())
                .all(|v| std::mem::discriminant(v) == std::mem::discriminant(f))
        });

        match (uniform, first) {
            (true, Some(Value::Bool(_))) if values.iter().all(|v| !v.is_null()) => {
                ColumnData::Bool(values.iter().map(|v| matches!(v, Value::Bool(true))).collect())
            }
            (true, Some(Value::Int(_))) if values.iter().all(|v| !v.is_null()) => {
                ColumnData::Int(
                    values
                        .iter()
                        .map(|v| match v {
                            Value::Int(i) => *i,
                            _ => 0,
                        })
                        .collect(),
                )
            }
            (true, Some(Value::Int(_))) | (true, Some(Value::Float(_))) => ColumnData::Float(
                values
                    .iter()
                    .map(|v| v.as_f64().unwrap_or(f64::NAN))
                    .collect(),
            ),
            (true, Some(Value::Date(_))) => ColumnData::Date(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Date(d) => Some(*d),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => ColumnData::Text(values.iter().map(|v| v.to_string()).collect()),
        }
    }
}
