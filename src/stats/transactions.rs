//! Transaction utilization summaries
//!
//! Transaction columns are reshaped from wide (one count/amount pair per type)
//! to long (one slice per type), then summarized by the caller's group keys
//! with the transaction type appended as the trailing key.

use super::formula::{self, Formula, Template};
use super::summary::{regroup_positions, SummaryTable};
use super::{owned_keys, rows_to_keep};
use crate::error::XpsResult;
use crate::exposure::{select_trx_types, ExposedTable, TrxType};
use crate::table::{partition, partition_by, Table, Value};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Name of the implicit trailing group key
pub const TRX_TYPE_KEY: &str = "trx_type";

/// Configuration for a transaction study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrxStatsConfig {
    /// Exposure column
    pub exposure_col: String,

    /// Transaction types to summarize; all discovered types when `None`
    pub trx_types: Option<Vec<String>>,

    /// Denominator columns for "percent of" ratios (e.g. account value)
    pub percent_of: Vec<String>,

    /// Collapse all selected types into a single "All" type
    pub combine_trx: bool,

    /// Drop rows whose exposure is not 1
    pub full_exposures_only: bool,
}

impl Default for TrxStatsConfig {
    fn default() -> Self {
        Self {
            exposure_col: "exposure".to_string(),
            trx_types: None,
            percent_of: Vec::new(),
            combine_trx: false,
            full_exposures_only: true,
        }
    }
}

/// Metadata carried by a transaction summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrxMeta {
    /// Caller-supplied keys; `trx_type` is implied after them
    pub group_keys: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Types in scope (just "All" when combined)
    pub trx_types: Vec<TrxType>,
    pub percent_of: Vec<String>,
    pub combine_trx: bool,
    pub full_exposures_only: bool,
}

/// Additive totals of one group and transaction type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrxTotals {
    pub trx_n: f64,
    /// Periods with at least one transaction
    pub trx_flag: f64,
    pub trx_amt: f64,
    pub exposure: f64,
    /// Per percent-of column: denominator summed over flagged periods
    pub w_trx: Vec<f64>,
    /// Per percent-of column: denominator summed over all periods
    pub all: Vec<f64>,
}

impl TrxTotals {
    fn zero(n_pct: usize) -> Self {
        Self {
            w_trx: vec![0.0; n_pct],
            all: vec![0.0; n_pct],
            ..Default::default()
        }
    }

    fn merge(&mut self, other: &TrxTotals) {
        self.trx_n += other.trx_n;
        self.trx_flag += other.trx_flag;
        self.trx_amt += other.trx_amt;
        self.exposure += other.exposure;
        for (acc, x) in self.w_trx.iter_mut().zip(&other.w_trx) {
            *acc += x;
        }
        for (acc, x) in self.all.iter_mut().zip(&other.all) {
            *acc += x;
        }
    }
}

/// One output row
#[derive(Debug, Clone, PartialEq)]
pub struct TrxRow {
    /// Caller key values followed by the transaction type
    pub key: Vec<Value>,
    pub totals: TrxTotals,
    /// Average transaction when one occurred
    pub avg_trx: f64,
    /// Average transaction over all periods
    pub avg_all: f64,
    pub trx_freq: f64,
    pub trx_util: f64,
    derived: Vec<f64>,
}

impl TrxRow {
    pub fn trx_type(&self) -> Option<&Value> {
        self.key.last()
    }

    pub fn derived(&self) -> &[f64] {
        &self.derived
    }
}

fn sum_w_trx(row: &TrxRow, i: usize) -> f64 {
    row.totals.w_trx[i]
}

fn sum_all(row: &TrxRow, i: usize) -> f64 {
    row.totals.all[i]
}

fn pct_of_w_trx(row: &TrxRow, i: usize) -> f64 {
    row.totals.trx_amt / row.totals.w_trx[i]
}

fn pct_of_all(row: &TrxRow, i: usize) -> f64 {
    row.totals.trx_amt / row.totals.all[i]
}

const PERCENT_OF_TEMPLATES: [Template<TrxRow>; 4] = [
    Template::new("", "_w_trx", sum_w_trx),
    Template::new("", "_all", sum_all),
    Template::new("pct_of_", "_w_trx", pct_of_w_trx),
    Template::new("pct_of_", "_all", pct_of_all),
];

fn finish(key: Vec<Value>, totals: TrxTotals, formulas: &[Formula<TrxRow>]) -> TrxRow {
    let mut row = TrxRow {
        key,
        avg_trx: totals.trx_amt / totals.trx_flag,
        avg_all: totals.trx_amt / totals.exposure,
        trx_freq: totals.trx_n / totals.exposure,
        trx_util: totals.trx_flag / totals.exposure,
        totals,
        derived: Vec::new(),
    };
    row.derived = formulas.iter().map(|f| f.evaluate(&row)).collect();
    row
}

/// One transaction type in long form: count and amount per source row
struct LongTrx {
    trx_type: TrxType,
    counts: Vec<f64>,
    amounts: Vec<f64>,
}

/// Wide-to-long reshape of the selected count/amount column pairs
fn pivot_longer(table: &Table, types: &[TrxType], combine: bool) -> XpsResult<Vec<LongTrx>> {
    let long = types
        .iter()
        .map(|t| {
            Ok(LongTrx {
                trx_type: t.clone(),
                counts: table.numeric(&t.count_column())?,
                amounts: table.numeric(&t.amount_column())?,
            })
        })
        .collect::<XpsResult<Vec<_>>>()?;

    if !combine {
        return Ok(long);
    }

    let n = table.n_rows();
    let mut all = LongTrx {
        trx_type: TrxType::combined(),
        counts: vec![0.0; n],
        amounts: vec![0.0; n],
    };
    for t in &long {
        for r in 0..n {
            all.counts[r] += t.counts[r];
            all.amounts[r] += t.amounts[r];
        }
    }
    Ok(vec![all])
}

/// Transaction summary: rows plus metadata
#[derive(Debug, Clone)]
pub struct TrxSummary {
    meta: TrxMeta,
    formulas: Vec<Formula<TrxRow>>,
    rows: Vec<TrxRow>,
}

impl TrxSummary {
    pub fn meta(&self) -> &TrxMeta {
        &self.meta
    }

    pub fn rows(&self) -> &[TrxRow] {
        &self.rows
    }

    /// Names of the percent-of columns
    pub fn derived_columns(&self) -> Vec<String> {
        self.formulas.iter().map(|f| f.name().to_string()).collect()
    }
}

/// Summarize transactions by the given group keys and transaction type.
///
/// `trx_type` is always the trailing key; listing it in `group_by` is allowed.
pub fn trx_stats(
    data: &ExposedTable,
    group_by: &[&str],
    config: &TrxStatsConfig,
) -> XpsResult<TrxSummary> {
    let table = data.table();
    let caller: Vec<&str> = group_by
        .iter()
        .copied()
        .filter(|k| *k != TRX_TYPE_KEY)
        .collect();
    let group_keys = owned_keys(table, &caller)?;
    let selected = select_trx_types(data.trx_types(), config.trx_types.as_deref())?;

    let exposure = table.numeric(&config.exposure_col)?;
    let percent_of = config
        .percent_of
        .iter()
        .map(|col| table.numeric(col))
        .collect::<XpsResult<Vec<_>>>()?;

    let long = pivot_longer(table, &selected, config.combine_trx)?;
    let rows = rows_to_keep(table, &exposure, config.full_exposures_only);
    let partitions = partition(table, &group_keys, rows)?;
    log::debug!(
        "Transaction study over {} groups x {} types",
        partitions.len(),
        long.len()
    );

    let meta = TrxMeta {
        group_keys,
        start_date: data.meta().start_date,
        end_date: data.meta().end_date,
        trx_types: long.iter().map(|t| t.trx_type.clone()).collect(),
        percent_of: config.percent_of.clone(),
        combine_trx: config.combine_trx,
        full_exposures_only: config.full_exposures_only,
    };
    let formulas = formula::generate(&PERCENT_OF_TEMPLATES, &meta.percent_of);

    let grouped: Vec<Vec<TrxRow>> = partitions
        .into_par_iter()
        .map(|part| {
            long.iter()
                .map(|trx| {
                    let mut totals = TrxTotals::zero(percent_of.len());
                    for &r in &part.rows {
                        let flag = if trx.counts[r].abs() > 0.0 { 1.0 } else { 0.0 };
                        totals.trx_n += trx.counts[r];
                        totals.trx_flag += flag;
                        totals.trx_amt += trx.amounts[r];
                        totals.exposure += exposure[r];
                        for (i, col) in percent_of.iter().enumerate() {
                            totals.w_trx[i] += col[r] * flag;
                            totals.all[i] += col[r];
                        }
                    }
                    let mut key = part.key.clone();
                    key.push(Value::Text(trx.trx_type.to_string()));
                    finish(key, totals, &formulas)
                })
                .collect()
        })
        .collect();

    Ok(TrxSummary {
        meta,
        formulas,
        rows: grouped.into_iter().flatten().collect(),
    })
}

impl SummaryTable for TrxSummary {
    fn group_keys(&self) -> Vec<String> {
        let mut keys = self.meta.group_keys.clone();
        keys.push(TRX_TYPE_KEY.to_string());
        keys
    }

    fn metric_columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = [
            "trx_n", "trx_flag", "trx_amt", "exposure", "avg_trx", "avg_all", "trx_freq",
            "trx_util",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        cols.extend(self.derived_columns());
        cols
    }

    fn primary_metric(&self) -> &'static str {
        "trx_util"
    }

    fn n_rows(&self) -> usize {
        self.rows.len()
    }

    fn key_values(&self, row: usize) -> &[Value] {
        &self.rows[row].key
    }

    fn metric(&self, row: usize, name: &str) -> Option<f64> {
        let r = self.rows.get(row)?;
        match name {
            "trx_n" => Some(r.totals.trx_n),
            "trx_flag" => Some(r.totals.trx_flag),
            "trx_amt" => Some(r.totals.trx_amt),
            "exposure" => Some(r.totals.exposure),
            "avg_trx" => Some(r.avg_trx),
            "avg_all" => Some(r.avg_all),
            "trx_freq" => Some(r.trx_freq),
            "trx_util" => Some(r.trx_util),
            _ => self
                .formulas
                .iter()
                .position(|f| f.name() == name)
                .map(|i| r.derived[i]),
        }
    }

    /// `trx_type` is always kept, whether or not it is listed
    fn summary(&self, group_by: &[&str]) -> XpsResult<Self> {
        let caller: Vec<&str> = group_by
            .iter()
            .copied()
            .filter(|k| *k != TRX_TYPE_KEY)
            .collect();
        let positions = regroup_positions(&self.meta.group_keys, &caller)?;
        let n_pct = self.meta.percent_of.len();

        let parts = partition_by(0..self.rows.len(), positions.len() + 1, |i| {
            let key = &self.rows[i].key;
            let mut out: Vec<Value> = positions.iter().map(|&p| key[p].clone()).collect();
            out.extend(key.last().cloned());
            out
        });

        let mut rows: Vec<TrxRow> = parts
            .into_iter()
            .map(|part| {
                let mut totals = TrxTotals::zero(n_pct);
                for &i in &part.rows {
                    totals.merge(&self.rows[i].totals);
                }
                finish(part.key, totals, &self.formulas)
            })
            .collect();

        // an empty summary collapsed to no keys still has one row per type
        if rows.is_empty() && caller.is_empty() {
            rows = self
                .meta
                .trx_types
                .iter()
                .map(|t| {
                    finish(
                        vec![Value::Text(t.to_string())],
                        TrxTotals::zero(n_pct),
                        &self.formulas,
                    )
                })
                .collect();
        }

        let mut meta = self.meta.clone();
        meta.group_keys = caller.iter().map(|k| k.to_string()).collect();

        Ok(TrxSummary {
            meta,
            formulas: self.formulas.clone(),
            rows,
        })
    }
}
