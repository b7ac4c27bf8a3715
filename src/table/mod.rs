//! Minimal columnar table used as the input and output of experience studies
//!
//! Provides just what the aggregators need: typed columns, row selection,
//! composite-key grouping, and CSV/JSON conversion.

mod value;
mod column;
pub mod group;
pub mod loader;

pub use value::Value;
pub use column::ColumnData;
pub use group::{partition, partition_by, Partition};
pub use loader::{read_csv, read_csv_path, write_csv};

use crate::error::{XpsError, XpsResult};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;

/// A table of equally long named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<ColumnData>,
    n_rows: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column insertion
    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> XpsResult<Self> {
        self.push_column(name, data)?;
        Ok(self)
    }

    /// Add a column, replacing any existing column with the same name.
    ///
    /// The first column fixes the row count; later columns must match it.
    pub fn push_column(&mut self, name: impl Into<String>, data: ColumnData) -> XpsResult<()> {
        let name = name.into();
        if self.columns.is_empty() {
            self.n_rows = data.len();
        } else if data.len() != self.n_rows {
            return Err(XpsError::LengthMismatch {
                name,
                expected: self.n_rows,
                actual: data.len(),
            });
        }

        match self.names.iter().position(|n| *n == name) {
            Some(idx) => self.columns[idx] = data,
            None => {
                self.names.push(name);
                self.columns.push(data);
            }
        }
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> XpsResult<&ColumnData> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| XpsError::column_not_found(name))
    }

    /// Numeric copy of a column (bool and int columns are widened)
    pub fn numeric(&self, name: &str) -> XpsResult<Vec<f64>> {
        self.column(name)?.to_f64().ok_or_else(|| XpsError::NotNumeric {
            name: name.to_string(),
        })
    }

    /// Check that every name refers to an existing column
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> XpsResult<()> {
        for name in names {
            self.column(name.as_ref())?;
        }
        Ok(())
    }

    /// Values of the given columns at `row`, in order
    pub fn key_at(&self, row: usize, columns: &[&ColumnData]) -> Vec<Value> {
        columns.iter().map(|c| c.get(row)).collect()
    }

    /// Full row as values, in column order
    pub fn row(&self, row: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.get(row)).collect()
    }
}

/// Serializes as a sequence of records, one map per row, keys in column order
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Record<'a>(&'a Table, usize);

        impl Serialize for Record<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.n_cols()))?;
                for (name, col) in self.0.names.iter().zip(&self.0.columns) {
                    map.serialize_entry(name, &col.get(self.1))?;
                }
                map.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.n_rows))?;
        for row in 0..self.n_rows {
            seq.serialize_element(&Record(self, row))?;
        }
        seq.end()
    }
}

/// Right-aligned text rendering for terminal output
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = (0..self.n_rows)
            .map(|r| {
                self.columns
                    .iter()
                    .map(|c| match c.get(r) {
                        Value::Float(x) if x.is_finite() => format!("{:.6}", x),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = self
            .names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                cells
                    .iter()
                    .map(|row| row[i].len())
                    .chain(std::iter::once(name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header: Vec<String> = self
            .names
            .iter()
            .zip(&widths)
            .map(|(n, w)| format!("{:>w$}", n, w = w))
            .collect();
        writeln!(f, "{}", header.join(" "))?;
        writeln!(f, "{}", "-".repeat(header.join(" ").len()))?;

        for row in &cells {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:>w$}", c, w = w))
                .collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new()
            .with_column("pol_num", ColumnData::Int(vec![1, 2, 3]))
            .unwrap()
            .with_column("status", ColumnData::Text(vec!["Active".into(), "Surrender".into(), "Active".into()]))
            .unwrap()
            .with_column("exposure", ColumnData::Float(vec![1.0, 0.5, 1.0]))
            .unwrap()
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = sample().with_column("bad", ColumnData::Int(vec![1]));
        assert!(matches!(result, Err(XpsError::LengthMismatch { expected: 3, actual: 1, .. })));
    }

    #[test]
    fn test_push_replaces_existing() {
        let mut table = sample();
        table.push_column("exposure", ColumnData::Float(vec![0.0; 3])).unwrap();
        assert_eq!(table.n_cols(), 3);
        assert_eq!(table.numeric("exposure").unwrap(), vec![0.0; 3]);
    }

    #[test]
    fn test_numeric_errors() {
        let table = sample();
        assert!(matches!(table.numeric("status"), Err(XpsError::NotNumeric { .. })));
        assert!(matches!(table.numeric("nope"), Err(XpsError::ColumnNotFound { .. })));
        assert_eq!(table.numeric("pol_num").unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_row_values() {
        assert_eq!(sample().row(2), vec![Value::Int(3), Value::from("Active"), Value::Float(1.0)]);
    }

    #[test]
    fn test_json_records_keep_column_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"[{"pol_num":1,"status":"Active","exposure":1.0},"#,
                r#"{"pol_num":2,"status":"Surrender","exposure":0.5},"#,
                r#"{"pol_num":3,"status":"Active","exposure":1.0}]"#
            )
        );
    }

    #[test]
    fn test_display_has_header() {
        let text = sample().to_string();
        assert!(text.lines().next().unwrap().contains("exposure"));
        assert_eq!(text.lines().count(), 5);
    }
}
