//! Transaction type discovery
//!
//! Transaction columns come in pairs named `trx_n_<type>` (count) and
//! `trx_amt_<type>` (amount). The set of types is discovered once when an
//! exposed table is built; the aggregators only ever see [`TrxType`] values.

use crate::error::{XpsError, XpsResult};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const COUNT_PREFIX: &str = "trx_n_";
pub const AMOUNT_PREFIX: &str = "trx_amt_";

/// Name of the synthetic type produced when combining transactions
pub const COMBINED_TYPE: &str = "All";

/// A recognized transaction type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrxType(String);

impl TrxType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The synthetic "All" type
    pub fn combined() -> Self {
        Self(COMBINED_TYPE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the count column for this type
    pub fn count_column(&self) -> String {
        format!("{}{}", COUNT_PREFIX, self.0)
    }

    /// Name of the amount column for this type
    pub fn amount_column(&self) -> String {
        format!("{}{}", AMOUNT_PREFIX, self.0)
    }
}

impl fmt::Display for TrxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scan column names for transaction column pairs.
///
/// Every count column needs its amount column and vice versa.
pub fn discover_trx_types(table: &Table) -> XpsResult<BTreeSet<TrxType>> {
    let mut types = BTreeSet::new();

    for name in table.column_names() {
        if let Some(suffix) = name.strip_prefix(COUNT_PREFIX) {
            let trx_type = TrxType::new(suffix);
            let partner = trx_type.amount_column();
            if !table.has_column(&partner) {
                return Err(XpsError::UnpairedTrxColumn {
                    column: name.clone(),
                    expected: partner,
                });
            }
            types.insert(trx_type);
        } else if let Some(suffix) = name.strip_prefix(AMOUNT_PREFIX) {
            let partner = TrxType::new(suffix).count_column();
            if !table.has_column(&partner) {
                return Err(XpsError::UnpairedTrxColumn {
                    column: name.clone(),
                    expected: partner,
                });
            }
        }
    }

    Ok(types)
}

/// Resolve requested transaction types against the discovered set.
///
/// `None` or an empty request selects every available type. Unknown names
/// are reported together, in request order.
pub fn select_trx_types(
    available: &BTreeSet<TrxType>,
    requested: Option<&[String]>,
) -> XpsResult<Vec<TrxType>> {
    let selected: Vec<TrxType> = match requested {
        Some(names) if !names.is_empty() => {
            let unmatched: Vec<String> = names
                .iter()
                .filter(|n| !available.contains(&TrxType::new(n.as_str())))
                .cloned()
                .collect();
            if !unmatched.is_empty() {
                return Err(XpsError::UnmatchedTrxTypes { types: unmatched });
            }
            let chosen: BTreeSet<TrxType> = names.iter().map(|n| TrxType::new(n.as_str())).collect();
            chosen.into_iter().collect()
        }
        _ => available.iter().cloned().collect(),
    };

    if selected.is_empty() {
        return Err(XpsError::invalid_config(
            "no transaction types were found on the table",
        ));
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnData;

    fn table_with(names: &[&str]) -> Table {
        let mut table = Table::new();
        for name in names {
            table.push_column(*name, ColumnData::Float(vec![0.0])).unwrap();
        }
        table
    }

    #[test]
    fn test_discover_pairs() {
        let table = table_with(&["exposure", "trx_n_A", "trx_amt_A", "trx_n_B", "trx_amt_B"]);
        let types = discover_trx_types(&table).unwrap();
        let names: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_unpaired_column_rejected() {
        let table = table_with(&["trx_n_A", "trx_amt_A", "trx_amt_B"]);
        match discover_trx_types(&table) {
            Err(XpsError::UnpairedTrxColumn { column, expected }) => {
                assert_eq!(column, "trx_amt_B");
                assert_eq!(expected, "trx_n_B");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_select_unmatched_names_offenders() {
        let available: BTreeSet<TrxType> = [TrxType::new("A"), TrxType::new("B")].into();
        let requested = vec!["A".to_string(), "C".to_string()];
        match select_trx_types(&available, Some(&requested)) {
            Err(XpsError::UnmatchedTrxTypes { types }) => assert_eq!(types, vec!["C"]),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_select_defaults_to_all() {
        let available: BTreeSet<TrxType> = [TrxType::new("B"), TrxType::new("A")].into();
        let all = select_trx_types(&available, None).unwrap();
        assert_eq!(all, vec![TrxType::new("A"), TrxType::new("B")]);

        let none = BTreeSet::new();
        assert!(select_trx_types(&none, None).is_err());
    }
}
