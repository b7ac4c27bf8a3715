//! Grouped summary tables and re-aggregation
//!
//! A summary keeps the additive totals of every group next to the derived
//! values. Regrouping re-sums the totals and recomputes every derived value
//! from them, so a summary regrouped from a finer summary matches one
//! computed from the raw records directly.

use crate::error::{XpsError, XpsResult};
use crate::table::{ColumnData, Table, Value};
use std::collections::HashSet;

/// Read-only interface shared by experience and transaction summaries
pub trait SummaryTable: Sized {
    /// Group key column names, in display order
    fn group_keys(&self) -> Vec<String>;

    /// Numeric output column names, in display order
    fn metric_columns(&self) -> Vec<String>;

    /// Default metric for charts when no axis mapping is given
    fn primary_metric(&self) -> &'static str;

    fn n_rows(&self) -> usize;

    /// Key values of a row, aligned with [`SummaryTable::group_keys`]
    fn key_values(&self, row: usize) -> &[Value];

    /// Value of a metric column for a row
    fn metric(&self, row: usize, name: &str) -> Option<f64>;

    /// Re-aggregate to a subset of the current group keys
    fn summary(&self, group_by: &[&str]) -> XpsResult<Self>;

    /// A whole metric column
    fn column(&self, name: &str) -> Option<Vec<f64>> {
        (0..self.n_rows()).map(|r| self.metric(r, name)).collect()
    }

    /// Flatten into a plain table: key columns, then metric columns
    fn to_table(&self) -> XpsResult<Table> {
        let mut table = Table::new();
        for (k, name) in self.group_keys().into_iter().enumerate() {
            let values = (0..self.n_rows())
                .map(|r| self.key_values(r)[k].clone())
                .collect();
            table.push_column(name, ColumnData::from_values(values))?;
        }
        for name in self.metric_columns() {
            let values = self.column(&name).unwrap_or_default();
            table.push_column(name, ColumnData::Float(values))?;
        }
        Ok(table)
    }
}

/// A key listed twice would give two key columns with one name
pub(crate) fn check_unique_keys(keys: &[&str]) -> XpsResult<()> {
    let mut seen = HashSet::new();
    match keys.iter().find(|k| !seen.insert(**k)) {
        Some(key) => Err(XpsError::invalid_config(format!(
            "group key '{}' is listed more than once",
            key
        ))),
        None => Ok(()),
    }
}

/// Positions of the requested keys within the current keys.
///
/// Only coarsening is possible: every requested key must already be a group
/// key of the summary, and no key may repeat.
pub fn regroup_positions(current: &[String], requested: &[&str]) -> XpsResult<Vec<usize>> {
    check_unique_keys(requested)?;
    requested
        .iter()
        .map(|key| {
            current
                .iter()
                .position(|c| c == key)
                .ok_or_else(|| XpsError::InvalidRegroup {
                    key: key.to_string(),
                    current: current.to_vec(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regroup_positions() {
        let current = vec!["pol_yr".to_string(), "product".to_string()];
        assert_eq!(regroup_positions(&current, &["product"]).unwrap(), vec![1]);
        assert_eq!(regroup_positions(&current, &[]).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_regroup_rejects_finer_keys() {
        let current = vec!["pol_yr".to_string()];
        match regroup_positions(&current, &["issue_age"]) {
            Err(XpsError::InvalidRegroup { key, .. }) => assert_eq!(key, "issue_age"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_regroup_rejects_repeated_keys() {
        let current = vec!["pol_yr".to_string(), "product".to_string()];
        assert!(matches!(
            regroup_positions(&current, &["product", "product"]),
            Err(XpsError::InvalidConfig { .. })
        ));
        assert!(check_unique_keys(&["pol_yr", "product"]).is_ok());
    }
}
