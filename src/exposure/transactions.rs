//! Attach raw transaction records to exposure periods
//!
//! Each transaction is matched to the exposure row for the same policy whose
//! period contains the transaction date. Matched counts and amounts are summed
//! into `trx_n_<type>` / `trx_amt_<type>` columns.

use super::{ExposedTable, TrxType};
use crate::error::{XpsError, XpsResult};
use crate::table::{ColumnData, Table, Value};
use chrono::NaiveDate;
use csv::Reader;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// A single transaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub pol_num: String,
    pub trx_date: NaiveDate,
    pub trx_type: String,
    pub trx_amt: f64,
}

/// Columns of the exposure table used for matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachConfig {
    /// Policy identifier column
    pub policy_col: String,

    /// First day of each exposure period
    pub period_start_col: String,

    /// Last day of each exposure period
    pub period_end_col: String,
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            policy_col: "pol_num".to_string(),
            period_start_col: "period_start".to_string(),
            period_end_col: "period_end".to_string(),
        }
    }
}

fn date_column<'a>(table: &'a Table, name: &str) -> XpsResult<&'a [Option<NaiveDate>]> {
    match table.column(name)? {
        ColumnData::Date(dates) => Ok(dates.as_slice()),
        _ => Err(XpsError::NotDate {
            name: name.to_string(),
        }),
    }
}

/// A transaction's policy id as a value of the policy column's type, so
/// `0001` finds policy `1` in an integer column
fn policy_key(policies: &ColumnData, pol_num: &str) -> Value {
    let text = pol_num.trim();
    let parsed = match policies {
        ColumnData::Int(_) => text.parse().ok().map(Value::Int),
        ColumnData::Float(_) => text.parse().ok().map(Value::Float),
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::Text(text.to_string()))
}

/// Add transaction columns to an exposed table.
///
/// Types already present on the table are rejected. Transactions that fall
/// outside every exposure period of their policy are dropped.
pub fn add_transactions(
    exposed: &ExposedTable,
    transactions: &[Transaction],
    config: &AttachConfig,
) -> XpsResult<ExposedTable> {
    let table = exposed.table();
    let policies = table.column(&config.policy_col)?;
    let starts = date_column(table, &config.period_start_col)?;
    let ends = date_column(table, &config.period_end_col)?;

    let new_types: Vec<TrxType> = transactions
        .iter()
        .map(|t| TrxType::new(t.trx_type.as_str()))
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let duplicates: Vec<String> = new_types
        .iter()
        .filter(|t| exposed.trx_types().contains(*t))
        .map(|t| t.to_string())
        .collect();
    if !duplicates.is_empty() {
        return Err(XpsError::DuplicateTrxTypes { types: duplicates });
    }

    // policy id -> exposure rows
    let mut rows_by_policy: HashMap<Value, Vec<usize>> = HashMap::new();
    for row in 0..table.n_rows() {
        let key = match policies.get(row) {
            v @ (Value::Int(_) | Value::Float(_) | Value::Text(_)) => v,
            other => Value::Text(other.to_string()),
        };
        rows_by_policy.entry(key).or_default().push(row);
    }

    let n_rows = table.n_rows();
    let mut totals: BTreeMap<&TrxType, (Vec<i64>, Vec<f64>)> = new_types
        .iter()
        .map(|t| (t, (vec![0; n_rows], vec![0.0; n_rows])))
        .collect();

    let mut unmatched = 0usize;
    for trx in transactions {
        let row = rows_by_policy.get(&policy_key(policies, &trx.pol_num)).and_then(|rows| {
            rows.iter().copied().find(|&r| match (starts[r], ends[r]) {
                (Some(start), Some(end)) => start <= trx.trx_date && trx.trx_date <= end,
                _ => false,
            })
        });

        match row {
            Some(r) => {
                let trx_type = TrxType::new(trx.trx_type.as_str());
                if let Some((counts, amounts)) = totals.get_mut(&trx_type) {
                    counts[r] += 1;
                    amounts[r] += trx.trx_amt;
                }
            }
            None => unmatched += 1,
        }
    }

    if unmatched > 0 {
        log::warn!(
            "{} of {} transactions fell outside every exposure period",
            unmatched,
            transactions.len()
        );
    }

    let mut out = table.clone();
    for (trx_type, (counts, amounts)) in totals {
        out.push_column(trx_type.count_column(), ColumnData::Int(counts))?;
        out.push_column(trx_type.amount_column(), ColumnData::Float(amounts))?;
    }

    ExposedTable::new(out, exposed.meta().clone())
}

/// Load transactions from any reader (e.g., string buffer, file)
pub fn load_transactions_from_reader<R: std::io::Read>(reader: R) -> XpsResult<Vec<Transaction>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut transactions = Vec::new();

    for result in csv_reader.deserialize() {
        let trx: Transaction = result?;
        if trx.trx_type.is_empty() {
            return Err(XpsError::Parse {
                column: "trx_type".to_string(),
                reason: format!("empty transaction type for policy {}", trx.pol_num),
            });
        }
        transactions.push(trx);
    }

    Ok(transactions)
}

/// Load transactions from a CSV file with columns
/// `pol_num,trx_date,trx_type,trx_amt`
pub fn load_transactions<P: AsRef<Path>>(path: P) -> XpsResult<Vec<Transaction>> {
    let file = std::fs::File::open(path)?;
    load_transactions_from_reader(file)
}
