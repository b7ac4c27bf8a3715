//! Exposed tables: exposure records bundled with their study metadata
//!
//! An exposure table produced upstream carries the study window and the set
//! of statuses that count as terminations. Both aggregators accept only an
//! [`ExposedTable`], so a table without this metadata can never reach them.

mod trx_types;
pub mod transactions;

pub use trx_types::{
    discover_trx_types, select_trx_types, TrxType, AMOUNT_PREFIX, COMBINED_TYPE, COUNT_PREFIX,
};
pub use transactions::{
    add_transactions, load_transactions, load_transactions_from_reader, AttachConfig,
    Transaction,
};

use crate::error::{XpsError, XpsResult};
use crate::table::Table;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Study metadata attached to an exposure table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureMeta {
    /// First day of the study window
    pub start_date: NaiveDate,

    /// Last day of the study window
    pub end_date: NaiveDate,

    /// Status values that count as a termination
    pub target_status: Vec<String>,
}

impl ExposureMeta {
    pub fn builder() -> ExposureMetaBuilder {
        ExposureMetaBuilder::default()
    }
}

/// Collects metadata that may or may not be present (e.g. from CLI flags)
#[derive(Debug, Clone, Default)]
pub struct ExposureMetaBuilder {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    target_status: Vec<String>,
}

impl ExposureMetaBuilder {
    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    pub fn target_status<S: Into<String>>(mut self, status: impl IntoIterator<Item = S>) -> Self {
        self.target_status = status.into_iter().map(Into::into).collect();
        self
    }

    /// Fails with [`XpsError::NotExposed`] naming the first missing attribute
    pub fn build(self) -> XpsResult<ExposureMeta> {
        let start_date = self.start_date.ok_or(XpsError::NotExposed {
            attribute: "start_date",
        })?;
        let end_date = self.end_date.ok_or(XpsError::NotExposed {
            attribute: "end_date",
        })?;
        if self.target_status.is_empty() {
            return Err(XpsError::NotExposed {
                attribute: "target_status",
            });
        }
        if end_date < start_date {
            return Err(XpsError::invalid_config(format!(
                "study end date {} precedes start date {}",
                end_date, start_date
            )));
        }

        Ok(ExposureMeta {
            start_date,
            end_date,
            target_status: self.target_status,
        })
    }
}

/// An exposure table with its metadata and discovered transaction types
#[derive(Debug, Clone, PartialEq)]
pub struct ExposedTable {
    table: Table,
    meta: ExposureMeta,
    trx_types: BTreeSet<TrxType>,
}

impl ExposedTable {
    /// Wrap a table, discovering its transaction columns
    pub fn new(table: Table, meta: ExposureMeta) -> XpsResult<Self> {
        let trx_types = discover_trx_types(&table)?;
        if !trx_types.is_empty() {
            log::debug!(
                "Discovered transaction types: {}",
                trx_types.iter().map(TrxType::as_str).collect::<Vec<_>>().join(", ")
            );
        }
        Ok(Self {
            table,
            meta,
            trx_types,
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn meta(&self) -> &ExposureMeta {
        &self.meta
    }

    /// Transaction types available on this table
    pub fn trx_types(&self) -> &BTreeSet<TrxType> {
        &self.trx_types
    }
}
