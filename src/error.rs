//! Error types for experience study calculations.
//!
//! Every precondition failure surfaces as an [`XpsError`]. Numeric edge cases
//! such as zero exposure are not errors; they flow through as non-finite
//! values in the summary rows.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type XpsResult<T> = Result<T, XpsError>;

/// The main error type for experience study operations.
#[derive(Error, Debug)]
pub enum XpsError {
    /// The source table lacks one of the attributes of an exposed table.
    #[error("Table is not an exposed table: missing {attribute}")]
    NotExposed {
        /// Name of the missing attribute.
        attribute: &'static str,
    },

    /// A referenced column does not exist.
    #[error("Column not found: {name}")]
    ColumnNotFound {
        /// Name of the missing column.
        name: String,
    },

    /// A column used in arithmetic is not numeric.
    #[error("Column {name} is not numeric")]
    NotNumeric {
        /// Name of the offending column.
        name: String,
    },

    /// A column used for period matching does not hold dates.
    #[error("Column {name} is not a date column")]
    NotDate {
        /// Name of the offending column.
        name: String,
    },

    /// Requested transaction types are not present on the table.
    #[error("The following transaction types do not exist in the data: {}", .types.join(", "))]
    UnmatchedTrxTypes {
        /// The requested types that could not be matched.
        types: Vec<String>,
    },

    /// A transaction count column has no amount column (or vice versa).
    #[error("Transaction column {column} has no matching {expected} column")]
    UnpairedTrxColumn {
        /// The column that was found.
        column: String,
        /// The partner column that is missing.
        expected: String,
    },

    /// Transactions being attached collide with types already on the table.
    #[error("Transaction types already exist in the data: {}", .types.join(", "))]
    DuplicateTrxTypes {
        /// The colliding types.
        types: Vec<String>,
    },

    /// A regroup asked for keys the summary was not grouped by.
    #[error("Cannot regroup by {key}: summary is grouped by [{}]", .current.join(", "))]
    InvalidRegroup {
        /// The unavailable key.
        key: String,
        /// The summary's current group keys.
        current: Vec<String>,
    },

    /// A column was added whose length differs from the table's row count.
    #[error("Column {name} has {actual} rows, expected {expected}")]
    LengthMismatch {
        /// Column name.
        name: String,
        /// Rows in the table.
        expected: usize,
        /// Rows in the column.
        actual: usize,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },

    /// A cell could not be parsed.
    #[error("Parse error in column {column}: {reason}")]
    Parse {
        /// Column being parsed.
        column: String,
        /// Description of the failure.
        reason: String,
    },

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl XpsError {
    /// Create a column-not-found error.
    pub fn column_not_found(name: impl Into<String>) -> Self {
        Self::ColumnNotFound { name: name.into() }
    }

    /// Create an invalid-config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
