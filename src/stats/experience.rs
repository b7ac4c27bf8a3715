//! Termination experience summaries
//!
//! Counts terminations and exposure per group and derives the observed
//! termination rate `q_obs = claims / exposure`. Optionally adds
//! limited-fluctuation credibility and, for each expected-rate column, the
//! exposure-weighted expected rate, the actual-to-expected ratio and the
//! credibility-blended rate.

use super::credibility::{
    limited_fluctuation, weight_cv_squared, DEFAULT_FULL_CREDIBILITY_STANDARD,
};
use super::formula::{self, Formula, Template};
use super::summary::{regroup_positions, SummaryTable};
use super::{owned_keys, rows_to_keep};
use crate::error::{XpsError, XpsResult};
use crate::exposure::ExposedTable;
use crate::table::{partition, partition_by, Value};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Configuration for an experience study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpStatsConfig {
    /// Exposure column
    pub exposure_col: String,

    /// Status column compared against the target statuses
    pub status_col: String,

    /// Override of the table's target statuses
    pub target_status: Option<Vec<String>>,

    /// Optional weight column (e.g. face amount); unweighted when `None`
    pub weight_col: Option<String>,

    /// Expected termination rate columns
    pub expected: Vec<String>,

    /// Whether to compute credibility and blended rates
    pub credibility: bool,

    /// Claims needed for full credibility
    pub full_credibility_standard: f64,

    /// Drop rows whose exposure is not 1
    pub full_exposures_only: bool,
}

impl Default for ExpStatsConfig {
    fn default() -> Self {
        Self {
            exposure_col: "exposure".to_string(),
            status_col: "status".to_string(),
            target_status: None,
            weight_col: None,
            expected: Vec::new(),
            credibility: false,
            full_credibility_standard: DEFAULT_FULL_CREDIBILITY_STANDARD,
            full_exposures_only: true,
        }
    }
}

impl ExpStatsConfig {
    pub fn validate(&self) -> XpsResult<()> {
        if !(self.full_credibility_standard.is_finite() && self.full_credibility_standard > 0.0) {
            return Err(XpsError::invalid_config(format!(
                "full credibility standard must be positive, got {}",
                self.full_credibility_standard
            )));
        }
        Ok(())
    }
}

/// Metadata carried by an experience summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpMeta {
    pub group_keys: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub target_status: Vec<String>,
    pub expected: Vec<String>,
    pub weight_col: Option<String>,
    pub credibility: bool,
    pub full_credibility_standard: f64,
    pub full_exposures_only: bool,
}

impl ExpMeta {
    pub fn is_weighted(&self) -> bool {
        self.weight_col.is_some()
    }
}

/// Additive totals of one group
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpTotals {
    /// Number of terminations (never weighted)
    pub n_claims: f64,
    /// Terminations times weight
    pub claims: f64,
    /// Exposure times weight
    pub exposure: f64,
    pub weight: f64,
    pub weight_sq: f64,
    pub weight_n: f64,
    /// Per expected column: sum of expected rate times weighted exposure
    pub expected: Vec<f64>,
}

impl ExpTotals {
    fn zero(n_expected: usize) -> Self {
        Self {
            expected: vec![0.0; n_expected],
            ..Default::default()
        }
    }

    fn merge(&mut self, other: &ExpTotals) {
        self.n_claims += other.n_claims;
        self.claims += other.claims;
        self.exposure += other.exposure;
        self.weight += other.weight;
        self.weight_sq += other.weight_sq;
        self.weight_n += other.weight_n;
        for (acc, x) in self.expected.iter_mut().zip(&other.expected) {
            *acc += x;
        }
    }

    /// Mean weight
    pub fn ex_wt(&self) -> f64 {
        self.weight / self.weight_n
    }

    /// Mean squared weight
    pub fn ex2_wt(&self) -> f64 {
        self.weight_sq / self.weight_n
    }
}

/// One output row
#[derive(Debug, Clone, PartialEq)]
pub struct ExpRow {
    pub key: Vec<Value>,
    pub totals: ExpTotals,
    pub q_obs: f64,
    pub credibility: Option<f64>,
    derived: Vec<f64>,
}

impl ExpRow {
    /// Values of the expected-rate columns, aligned with the summary's
    /// derived column names
    pub fn derived(&self) -> &[f64] {
        &self.derived
    }
}

fn expected_rate(row: &ExpRow, i: usize) -> f64 {
    row.totals.expected[i] / row.totals.exposure
}

fn ae_ratio(row: &ExpRow, i: usize) -> f64 {
    row.q_obs / expected_rate(row, i)
}

fn adjusted_rate(row: &ExpRow, i: usize) -> f64 {
    let z = row.credibility.unwrap_or(0.0);
    z * row.q_obs + (1.0 - z) * expected_rate(row, i)
}

const EXPECTED_TEMPLATES: [Template<ExpRow>; 2] = [
    Template::new("", "", expected_rate),
    Template::new("ae_", "", ae_ratio),
];

const CREDIBILITY_TEMPLATES: [Template<ExpRow>; 1] = [Template::new("adj_", "", adjusted_rate)];

fn build_formulas(meta: &ExpMeta) -> Vec<Formula<ExpRow>> {
    let mut formulas = formula::generate(&EXPECTED_TEMPLATES, &meta.expected);
    if meta.credibility {
        formulas.extend(formula::generate(&CREDIBILITY_TEMPLATES, &meta.expected));
    }
    formulas
}

/// Derive every ratio of a group from its totals
fn finish(key: Vec<Value>, totals: ExpTotals, meta: &ExpMeta, formulas: &[Formula<ExpRow>]) -> ExpRow {
    let q_obs = totals.claims / totals.exposure;

    let credibility = meta.credibility.then(|| {
        let cv_sq = if meta.is_weighted() {
            weight_cv_squared(totals.weight, totals.weight_sq, totals.weight_n)
        } else {
            0.0
        };
        limited_fluctuation(totals.n_claims, meta.full_credibility_standard, cv_sq)
    });

    let mut row = ExpRow {
        key,
        totals,
        q_obs,
        credibility,
        derived: Vec::new(),
    };
    row.derived = formulas.iter().map(|f| f.evaluate(&row)).collect();
    row
}

/// Experience summary: rows plus metadata
#[derive(Debug, Clone)]
pub struct ExpSummary {
    meta: ExpMeta,
    formulas: Vec<Formula<ExpRow>>,
    rows: Vec<ExpRow>,
}

impl ExpSummary {
    pub fn meta(&self) -> &ExpMeta {
        &self.meta
    }

    pub fn rows(&self) -> &[ExpRow] {
        &self.rows
    }

    /// Names of the expected, A/E and blended columns
    pub fn derived_columns(&self) -> Vec<String> {
        self.formulas.iter().map(|f| f.name().to_string()).collect()
    }
}

/// Summarize termination experience by the given group keys
pub fn exp_stats(
    data: &ExposedTable,
    group_by: &[&str],
    config: &ExpStatsConfig,
) -> XpsResult<ExpSummary> {
    config.validate()?;
    let table = data.table();
    let group_keys = owned_keys(table, group_by)?;

    let exposure = table.numeric(&config.exposure_col)?;
    let status = table.column(&config.status_col)?;
    let target_status = config
        .target_status
        .clone()
        .unwrap_or_else(|| data.meta().target_status.clone());
    let targets: HashSet<&str> = target_status.iter().map(String::as_str).collect();
    let claim: Vec<f64> = (0..table.n_rows())
        .map(|r| {
            if targets.contains(status.get(r).to_string().as_str()) {
                1.0
            } else {
                0.0
            }
        })
        .collect();

    let weights = config
        .weight_col
        .as_deref()
        .map(|col| table.numeric(col))
        .transpose()?;
    let expected = config
        .expected
        .iter()
        .map(|col| table.numeric(col))
        .collect::<XpsResult<Vec<_>>>()?;

    let rows = rows_to_keep(table, &exposure, config.full_exposures_only);
    let partitions = partition(table, &group_keys, rows)?;
    log::debug!(
        "Experience study over {} groups by [{}]",
        partitions.len(),
        group_keys.join(", ")
    );

    let meta = ExpMeta {
        group_keys,
        start_date: data.meta().start_date,
        end_date: data.meta().end_date,
        target_status,
        expected: config.expected.clone(),
        weight_col: config.weight_col.clone(),
        credibility: config.credibility,
        full_credibility_standard: config.full_credibility_standard,
        full_exposures_only: config.full_exposures_only,
    };
    let formulas = build_formulas(&meta);

    let rows: Vec<ExpRow> = partitions
        .into_par_iter()
        .map(|part| {
            let mut totals = ExpTotals::zero(expected.len());
            for &r in &part.rows {
                let w = weights.as_ref().map_or(1.0, |w| w[r]);
                let weighted_exposure = exposure[r] * w;
                totals.n_claims += claim[r];
                totals.claims += claim[r] * w;
                totals.exposure += weighted_exposure;
                totals.weight += w;
                totals.weight_sq += w * w;
                totals.weight_n += 1.0;
                for (acc, col) in totals.expected.iter_mut().zip(&expected) {
                    *acc += col[r] * weighted_exposure;
                }
            }
            finish(part.key, totals, &meta, &formulas)
        })
        .collect();

    Ok(ExpSummary {
        meta,
        formulas,
        rows,
    })
}

impl SummaryTable for ExpSummary {
    fn group_keys(&self) -> Vec<String> {
        self.meta.group_keys.clone()
    }

    fn metric_columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = ["n_claims", "claims", "exposure", "q_obs"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if self.meta.is_weighted() {
            cols.extend(
                ["weight", "weight_sq", "weight_n", "ex_wt", "ex2_wt"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        }
        if self.meta.credibility {
            cols.push("credibility".to_string());
        }
        cols.extend(self.derived_columns());
        cols
    }

    fn primary_metric(&self) -> &'static str {
        "q_obs"
    }

    fn n_rows(&self) -> usize {
        self.rows.len()
    }

    fn key_values(&self, row: usize) -> &[Value] {
        &self.rows[row].key
    }

    fn metric(&self, row: usize, name: &str) -> Option<f64> {
        let r = self.rows.get(row)?;
        let t = &r.totals;
        let weighted = self.meta.is_weighted();
        match name {
            "n_claims" => Some(t.n_claims),
            "claims" => Some(t.claims),
            "exposure" => Some(t.exposure),
            "q_obs" => Some(r.q_obs),
            "weight" if weighted => Some(t.weight),
            "weight_sq" if weighted => Some(t.weight_sq),
            "weight_n" if weighted => Some(t.weight_n),
            "ex_wt" if weighted => Some(t.ex_wt()),
            "ex2_wt" if weighted => Some(t.ex2_wt()),
            "credibility" => r.credibility,
            _ => self
                .formulas
                .iter()
                .position(|f| f.name() == name)
                .map(|i| r.derived[i]),
        }
    }

    fn summary(&self, group_by: &[&str]) -> XpsResult<Self> {
        let positions = regroup_positions(&self.meta.group_keys, group_by)?;
        let parts = partition_by(0..self.rows.len(), positions.len(), |i| {
            positions.iter().map(|&p| self.rows[i].key[p].clone()).collect()
        });

        let mut meta = self.meta.clone();
        meta.group_keys = group_by.iter().map(|k| k.to_string()).collect();

        let rows = parts
            .into_iter()
            .map(|part| {
                let mut totals = ExpTotals::zero(meta.expected.len());
                for &i in &part.rows {
                    totals.merge(&self.rows[i].totals);
                }
                finish(part.key, totals, &meta, &self.formulas)
            })
            .collect();

        Ok(ExpSummary {
            meta,
            formulas: self.formulas.clone(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::fixtures::{meta, mixed_block, ten_policies};
    use crate::table::{ColumnData, Table};
    use approx::assert_relative_eq;

    fn full_config() -> ExpStatsConfig {
        ExpStatsConfig {
            weight_col: Some("face".to_string()),
            expected: vec!["expected_1".to_string(), "expected_2".to_string()],
            credibility: true,
            ..Default::default()
        }
    }

    fn assert_same_summary(a: &ExpSummary, b: &ExpSummary) {
        assert_eq!(a.n_rows(), b.n_rows());
        assert_eq!(a.metric_columns(), b.metric_columns());
        for row in 0..a.n_rows() {
            assert_eq!(a.key_values(row), b.key_values(row));
            for col in a.metric_columns() {
                let x = a.metric(row, &col).unwrap();
                let y = b.metric(row, &col).unwrap();
                if x.is_nan() {
                    assert!(y.is_nan(), "{} row {}: {} vs {}", col, row, x, y);
                } else {
                    assert_relative_eq!(x, y, max_relative = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_ten_policy_scenario() {
        let config = ExpStatsConfig {
            expected: vec!["expected_1".to_string()],
            ..Default::default()
        };
        let result = exp_stats(&ten_policies(), &[], &config).unwrap();

        assert_eq!(result.n_rows(), 1);
        assert_eq!(result.metric(0, "q_obs"), Some(0.3));
        assert_eq!(result.metric(0, "n_claims"), Some(3.0));
        assert_eq!(result.metric(0, "exposure"), Some(10.0));
        assert_eq!(result.metric(0, "expected_1"), Some(0.25));
        assert_relative_eq!(result.metric(0, "ae_expected_1").unwrap(), 1.2, epsilon = 1e-12);
        assert_eq!(result.metric(0, "adj_expected_1"), None);
    }

    #[test]
    fn test_grouping_cardinality() {
        let data = mixed_block();
        let config = ExpStatsConfig::default();

        let overall = exp_stats(&data, &[], &config).unwrap();
        assert_eq!(overall.n_rows(), 1);

        let by_both = exp_stats(&data, &["product", "pol_yr"], &config).unwrap();
        assert_eq!(by_both.n_rows(), 6);
        assert_eq!(by_both.key_values(0), &[Value::from("A"), Value::Int(1)]);
        assert_eq!(by_both.key_values(5), &[Value::from("B"), Value::Int(3)]);
    }

    #[test]
    fn test_regroup_matches_direct_aggregation() {
        let data = mixed_block();
        let config = full_config();

        let fine = exp_stats(&data, &["product", "pol_yr"], &config).unwrap();

        let direct = exp_stats(&data, &["pol_yr"], &config).unwrap();
        assert_same_summary(&fine.summary(&["pol_yr"]).unwrap(), &direct);

        let direct = exp_stats(&data, &[], &config).unwrap();
        assert_same_summary(&fine.summary(&[]).unwrap(), &direct);
        assert_same_summary(&fine.summary(&["pol_yr"]).unwrap().summary(&[]).unwrap(), &direct);
    }

    #[test]
    fn test_regroup_carries_metadata() {
        let fine = exp_stats(&mixed_block(), &["product", "pol_yr"], &full_config()).unwrap();
        let coarse = fine.summary(&["product"]).unwrap();
        assert_eq!(coarse.meta().group_keys, vec!["product"]);
        assert_eq!(coarse.meta().expected, fine.meta().expected);
        assert_eq!(coarse.meta().start_date, fine.meta().start_date);
        assert_eq!(coarse.meta().weight_col.as_deref(), Some("face"));
    }

    #[test]
    fn test_regroup_cannot_refine() {
        let coarse = exp_stats(&mixed_block(), &["product"], &ExpStatsConfig::default()).unwrap();
        assert!(matches!(
            coarse.summary(&["pol_yr"]),
            Err(XpsError::InvalidRegroup { .. })
        ));
    }

    #[test]
    fn test_credibility_bounds() {
        let result = exp_stats(&mixed_block(), &["product", "pol_yr"], &full_config()).unwrap();
        for z in result.column("credibility").unwrap() {
            assert!((0.0..=1.0).contains(&z));
        }

        let no_claims = ExpStatsConfig {
            target_status: Some(vec!["Lapse".to_string()]),
            credibility: true,
            ..Default::default()
        };
        let result = exp_stats(&mixed_block(), &[], &no_claims).unwrap();
        assert_eq!(result.metric(0, "credibility"), Some(0.0));

        let tiny_standard = ExpStatsConfig {
            credibility: true,
            full_credibility_standard: 0.01,
            ..Default::default()
        };
        let result = exp_stats(&mixed_block(), &[], &tiny_standard).unwrap();
        assert_eq!(result.metric(0, "credibility"), Some(1.0));
    }

    #[test]
    fn test_adjusted_rate_blends() {
        let config = ExpStatsConfig {
            expected: vec!["expected_1".to_string()],
            credibility: true,
            ..Default::default()
        };
        let result = exp_stats(&ten_policies(), &[], &config).unwrap();
        let z = result.metric(0, "credibility").unwrap();
        assert_relative_eq!(z, (3.0f64 / 1082.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(
            result.metric(0, "adj_expected_1").unwrap(),
            z * 0.3 + (1.0 - z) * 0.25,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_weighted_totals() {
        let config = ExpStatsConfig {
            weight_col: Some("face".to_string()),
            full_exposures_only: false,
            ..Default::default()
        };
        let data = mixed_block();
        let result = exp_stats(&data, &[], &config).unwrap();

        let table = data.table();
        let face = table.numeric("face").unwrap();
        let exposure = table.numeric("exposure").unwrap();
        let expected_exposure: f64 = face.iter().zip(&exposure).map(|(w, e)| w * e).sum();
        assert_relative_eq!(result.metric(0, "exposure").unwrap(), expected_exposure, max_relative = 1e-12);
        assert_eq!(result.metric(0, "weight_n"), Some(48.0));
        assert_relative_eq!(
            result.metric(0, "ex_wt").unwrap(),
            face.iter().sum::<f64>() / 48.0,
            max_relative = 1e-12
        );
        assert!(result.metric_columns().contains(&"ex2_wt".to_string()));
    }

    #[test]
    fn test_partial_exposures_dropped_by_default() {
        let data = mixed_block();
        let full = exp_stats(&data, &[], &ExpStatsConfig::default()).unwrap();
        let all = exp_stats(
            &data,
            &[],
            &ExpStatsConfig {
                full_exposures_only: false,
                ..Default::default()
            },
        )
        .unwrap();

        // rows 5, 16, 27, 38 are half exposed
        assert_eq!(full.metric(0, "exposure"), Some(44.0));
        assert_eq!(all.metric(0, "exposure"), Some(46.0));
    }

    #[test]
    fn test_zero_exposure_surfaces_nan() {
        let table = Table::new()
            .with_column("status", ColumnData::Text(vec!["Surrender".into(), "Active".into()]))
            .unwrap()
            .with_column("exposure", ColumnData::Float(vec![0.4, 0.6]))
            .unwrap();
        let data = ExposedTable::new(table, meta()).unwrap();

        let result = exp_stats(&data, &[], &ExpStatsConfig::default()).unwrap();
        assert_eq!(result.n_rows(), 1);
        assert_eq!(result.metric(0, "exposure"), Some(0.0));
        assert!(result.metric(0, "q_obs").unwrap().is_nan());
    }

    #[test]
    fn test_json_output_tells_infinite_from_undefined() {
        let status = vec!["Active".into(), "Lapse".into(), "Surrender".into()];
        let table = Table::new()
            .with_column("status", ColumnData::Text(status))
            .unwrap()
            .with_column("exposure", ColumnData::Float(vec![1.0, 0.0, 0.0]))
            .unwrap();
        let data = ExposedTable::new(table, meta()).unwrap();
        let config = ExpStatsConfig {
            full_exposures_only: false,
            ..Default::default()
        };

        let result = exp_stats(&data, &["status"], &config).unwrap();
        assert!(result.metric(1, "q_obs").unwrap().is_nan());
        assert_eq!(result.metric(2, "q_obs"), Some(f64::INFINITY));

        let json = serde_json::to_value(result.to_table().unwrap()).unwrap();
        assert_eq!(json[0]["q_obs"], serde_json::json!(0.0));
        assert_eq!(json[1]["q_obs"], serde_json::json!("NaN"));
        assert_eq!(json[2]["q_obs"], serde_json::json!("inf"));
    }

    #[test]
    fn test_repeated_group_key_is_rejected() {
        let data = mixed_block();
        let config = ExpStatsConfig::default();
        assert!(matches!(
            exp_stats(&data, &["product", "product"], &config),
            Err(XpsError::InvalidConfig { .. })
        ));

        let by_product = exp_stats(&data, &["product", "pol_yr"], &config).unwrap();
        assert!(matches!(
            by_product.summary(&["pol_yr", "pol_yr"]),
            Err(XpsError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_missing_columns_fail() {
        let config = ExpStatsConfig {
            expected: vec!["expected_9".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            exp_stats(&ten_policies(), &[], &config),
            Err(XpsError::ColumnNotFound { name }) if name == "expected_9"
        ));
        assert!(matches!(
            exp_stats(&ten_policies(), &["issue_age"], &ExpStatsConfig::default()),
            Err(XpsError::ColumnNotFound { .. })
        ));

        let config = ExpStatsConfig {
            weight_col: Some("status".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            exp_stats(&ten_policies(), &[], &config),
            Err(XpsError::NotNumeric { .. })
        ));
    }

    #[test]
    fn test_target_status_override() {
        let config = ExpStatsConfig {
            target_status: Some(vec!["Surrender".to_string(), "Death".to_string()]),
            full_exposures_only: false,
            ..Default::default()
        };
        let result = exp_stats(&mixed_block(), &[], &config).unwrap();
        // i % 7 in {0, 3} over 0..48: 7 + 7
        assert_eq!(result.metric(0, "n_claims"), Some(14.0));
        assert_eq!(result.meta().target_status, vec!["Surrender", "Death"]);
    }

    #[test]
    fn test_to_table_layout() {
        let config = ExpStatsConfig {
            expected: vec!["expected_1".to_string()],
            credibility: true,
            ..Default::default()
        };
        let table = exp_stats(&mixed_block(), &["pol_yr"], &config)
            .unwrap()
            .to_table()
            .unwrap();
        assert_eq!(
            table.column_names(),
            &[
                "pol_yr",
                "n_claims",
                "claims",
                "exposure",
                "q_obs",
                "credibility",
                "expected_1",
                "ae_expected_1",
                "adj_expected_1"
            ]
        );
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.column("pol_yr").unwrap().type_name(), "int");
    }

    #[test]
    fn test_invalid_standard_rejected() {
        let config = ExpStatsConfig {
            full_credibility_standard: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            exp_stats(&ten_policies(), &[], &config),
            Err(XpsError::InvalidConfig { .. })
        ));
    }
}
