//! Load tables from CSV and write them back out
//!
//! Column types are inferred from the text: integers, floats, booleans
//! (`TRUE`/`FALSE`), ISO dates (`YYYY-MM-DD`) and otherwise text. Empty cells
//! and `NA` count as missing.

use super::{ColumnData, Table};
use crate::error::XpsResult;
use chrono::NaiveDate;
use csv::{Reader, Writer};
use std::io::{Read, Write};
use std::path::Path;

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || cell == "NA"
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell {
        "TRUE" | "true" | "True" => Some(true),
        "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn parse_date(cell: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(cell, "%Y-%m-%d").ok()
}

/// Zero-padded codes such as `0001` are identifiers, not numbers
fn has_leading_zero(cell: &str) -> bool {
    let digits = cell.strip_prefix(&['-', '+'][..]).unwrap_or(cell);
    let mut chars = digits.chars();
    chars.next() == Some('0') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// Pick the narrowest type that every present cell parses as
fn infer_column(cells: Vec<String>) -> ColumnData {
    let present: Vec<&str> = cells
        .iter()
        .map(|c| c.trim())
        .filter(|c| !is_missing(c))
        .collect();
    let complete = present.len() == cells.len();

    if present.is_empty() || present.iter().any(|c| has_leading_zero(c)) {
        return ColumnData::Text(cells);
    }

    if complete && present.iter().all(|c| c.parse::<i64>().is_ok()) {
        return ColumnData::Int(cells.iter().map(|c| c.trim().parse().unwrap_or(0)).collect());
    }

    if present.iter().all(|c| c.parse::<f64>().is_ok()) {
        return ColumnData::Float(
            cells
                .iter()
                .map(|c| c.trim().parse().unwrap_or(f64::NAN))
                .collect(),
        );
    }

    if complete && present.iter().all(|c| parse_bool(c).is_some()) {
        return ColumnData::Bool(
            cells
                .iter()
                .map(|c| parse_bool(c.trim()).unwrap_or(false))
                .collect(),
        );
    }

    if present.iter().all(|c| parse_date(c).is_some()) {
        return ColumnData::Date(cells.iter().map(|c| parse_date(c.trim())).collect());
    }

    ColumnData::Text(cells)
}

/// Load a table from any reader (e.g., string buffer, file)
pub fn read_csv<R: Read>(reader: R) -> XpsResult<Table> {
    let mut csv_reader = Reader::from_reader(reader);
    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for result in csv_reader.records() {
        let record = result?;
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(record.get(i).unwrap_or("").to_string());
        }
    }

    let mut table = Table::new();
    for (name, column) in headers.into_iter().zip(cells) {
        let data = infer_column(column);
        log::trace!("Column {} read as {}", name, data.type_name());
        table.push_column(name, data)?;
    }

    log::debug!(
        "Loaded table with {} rows and {} columns",
        table.n_rows(),
        table.n_cols()
    );
    Ok(table)
}

/// Load a table from a CSV file
pub fn read_csv_path<P: AsRef<Path>>(path: P) -> XpsResult<Table> {
    let file = std::fs::File::open(path)?;
    read_csv(file)
}

/// Write a table as CSV with a header row
pub fn write_csv<W: Write>(table: &Table, writer: W) -> XpsResult<()> {
    let mut csv_writer = Writer::from_writer(writer);
    csv_writer.write_record(table.column_names())?;

    for row in 0..table.n_rows() {
        let record: Vec<String> = table.row(row).iter().map(|v| v.to_string()).collect();
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}
