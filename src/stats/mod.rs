//! Experience and transaction study aggregation
//!
//! Both pipelines take an [`ExposedTable`](crate::exposure::ExposedTable) and
//! a list of group keys, and return a summary implementing
//! [`SummaryTable`]:
//!
//! - [`exp_stats`]: termination rates, credibility and A/E ratios
//! - [`trx_stats`]: transaction frequency, severity and utilization
//!
//! # Example
//!
//! ```rust,ignore
//! use experience_study::stats::{exp_stats, ExpStatsConfig, SummaryTable};
//!
//! let config = ExpStatsConfig {
//!     expected: vec!["expected_1".to_string()],
//!     credibility: true,
//!     ..Default::default()
//! };
//! let by_year = exp_stats(&exposed, &["pol_yr", "product"], &config)?;
//! let overall = by_year.summary(&[])?;
//! println!("{}", overall.to_table()?);
//! ```

pub mod formula;
pub mod credibility;
pub mod summary;
mod experience;
mod transactions;

pub use experience::{exp_stats, ExpMeta, ExpRow, ExpStatsConfig, ExpSummary, ExpTotals};
pub use transactions::{trx_stats, TrxMeta, TrxRow, TrxStatsConfig, TrxSummary, TrxTotals};
pub use summary::SummaryTable;

use crate::error::XpsResult;
use crate::table::Table;

/// Tolerance used when testing whether an exposure equals 1
pub const FULL_EXPOSURE_TOLERANCE: f64 = 1.5e-8;

/// Rows to aggregate, honoring the partial-exposure policy.
///
/// Mixing full and partial periods skews rates, so by default only rows
/// whose exposure is (near) 1 are kept.
pub(crate) fn rows_to_keep(
    table: &Table,
    exposure: &[f64],
    full_exposures_only: bool,
) -> Vec<usize> {
    if !full_exposures_only {
        return (0..table.n_rows()).collect();
    }

    let kept: Vec<usize> = exposure
        .iter()
        .enumerate()
        .filter(|(_, &e)| (e - 1.0).abs() < FULL_EXPOSURE_TOLERANCE)
        .map(|(i, _)| i)
        .collect();

    let dropped = table.n_rows() - kept.len();
    if dropped > 0 {
        log::debug!("Dropped {} partially exposed rows", dropped);
    }
    kept
}

/// Group keys must be distinct and exist before any work is done
pub(crate) fn owned_keys(table: &Table, group_by: &[&str]) -> XpsResult<Vec<String>> {
    summary::check_unique_keys(group_by)?;
    table.require_columns(group_by)?;
    Ok(group_by.iter().map(|k| k.to_string()).collect())
}
