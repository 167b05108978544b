//! Tabular source access
//!
//! The spreadsheet is the source of truth for every reconciled entity. Readers get
//! ordered rows of string cells (rows may be shorter than the table schema when
//! trailing cells are empty); writers submit batches of cell updates.

pub mod client;
pub mod range;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use client::SheetsClient;
pub use range::{CellRef, TableRange, column_index, column_letters};

/// One ordered row of string cells
pub type Row = Vec<String>;

/// A write of one or more cells starting at `range`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueWrite {
    /// A1 range, e.g. `attributes!B4`
    pub range: String,
    /// Row-major values
    pub values: Vec<Vec<String>>,
}

impl ValueWrite {
    /// Write a single cell
    pub fn cell(range: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            range: range.into(),
            values: vec![vec![value.into()]],
        }
    }

    /// Write one row of cells starting at `range`
    pub fn row(range: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            range: range.into(),
            values: vec![values],
        }
    }
}

/// Read/write access to named ranges of the spreadsheet
#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Read all rows of `range`, top to bottom
    async fn read(&self, range: &TableRange) -> Result<Vec<Row>>;

    /// Apply a batch of independent cell writes together
    async fn write_batch(&self, writes: Vec<ValueWrite>) -> Result<()>;

    /// Insert an empty row before `index` (0-based) on the sheet with `sheet_id`
    async fn insert_blank_row(&self, sheet_id: i64, index: usize) -> Result<()>;
}

/// Normalise a cell returned by the API to its string form
///
/// Values are requested formatted, but numbers and booleans can still come back
/// unquoted depending on the render option.
pub fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            // Whole floats print without a trailing ".0"
            match n.as_f64() {
                Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    (f as i64).to_string()
                }
                _ => n.to_string(),
            }
        }
        other => other.to_string(),
    }
}

/// Cell at `index`, trimmed; empty when the row is shorter than the index
pub fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|s| s.trim()).unwrap_or("")
}

/// Cell at `index` as an owned string, None when blank
pub fn optional_cell(row: &[String], index: usize) -> Option<String> {
    let value = cell(row, index);
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
