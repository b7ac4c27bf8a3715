//! Experience Study - grouped termination and transaction summaries
//!
//! This library provides:
//! - A small columnar [`Table`] with CSV input/output
//! - Exposure metadata and transaction-type discovery ([`ExposedTable`])
//! - Attaching raw transaction records to exposure periods
//! - Termination studies: observed rates, credibility and A/E ratios
//! - Transaction studies: frequency, severity, utilization and percent-of ratios
//! - Re-aggregation of any summary to coarser group keys

pub mod error;
pub mod table;
pub mod exposure;
pub mod stats;

// Re-export commonly used types
pub use error::{XpsError, XpsResult};
pub use table::{read_csv, read_csv_path, write_csv, ColumnData, Table, Value};
pub use exposure::{add_transactions, AttachConfig, ExposedTable, ExposureMeta, TrxType};
pub use stats::{
    exp_stats, trx_stats, ExpStatsConfig, ExpSummary, SummaryTable, TrxStatsConfig, TrxSummary,
};
