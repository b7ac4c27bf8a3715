//! Composite-key grouping
//!
//! Rows are hash-partitioned by their key values, then the partitions are
//! sorted by key so downstream output is deterministic regardless of input
//! row order.

use super::{Table, Value};
use crate::error::XpsResult;
use std::collections::HashMap;

/// One group: its key values and the member row indices (in input order)
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub key: Vec<Value>,
    pub rows: Vec<usize>,
}

/// Partition arbitrary rows by a key function returning `key_width` values.
///
/// A zero-width key yields exactly one partition, even when `rows` is empty.
pub fn partition_by<F>(
    rows: impl IntoIterator<Item = usize>,
    key_width: usize,
    key_of: F,
) -> Vec<Partition>
where
    F: Fn(usize) -> Vec<Value>,
{
    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut partitions: Vec<Partition> = Vec::new();

    for row in rows {
        let key = key_of(row);
        match index.get(&key) {
            Some(&idx) => partitions[idx].rows.push(row),
            None => {
                index.insert(key.clone(), partitions.len());
                partitions.push(Partition { key, rows: vec![row] });
            }
        }
    }

    if partitions.is_empty() && key_width == 0 {
        partitions.push(Partition {
            key: Vec::new(),
            rows: Vec::new(),
        });
    }

    partitions.sort_by(|a, b| a.key.cmp(&b.key));
    partitions
}

/// Partition the given table rows by named key columns
pub fn partition<S: AsRef<str>>(
    table: &Table,
    keys: &[S],
    rows: impl IntoIterator<Item = usize>,
) -> XpsResult<Vec<Partition>> {
    let columns = keys
        .iter()
        .map(|k| table.column(k.as_ref()))
        .collect::<XpsResult<Vec<_>>>()?;

    Ok(partition_by(rows, columns.len(), |row| {
        table.key_at(row, &columns)
    }))
}
