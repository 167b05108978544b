//! Non-fatal data problems found while reconciling
//!
//! These never abort a phase: the affected row or write is skipped, the problem is
//! logged and collected so the run summary can list it.

use crate::api::Label;

/// A required cell is empty or unreadable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowDataError {
    /// A required cell is empty
    MissingCell { column: &'static str },
    /// A cell holds a value that cannot be interpreted
    InvalidCell {
        column: &'static str,
        value: String,
        reason: String,
    },
    /// A chain row with no toll header above it
    OrphanContinuation,
    /// A key that an earlier row of the same table already uses
    DuplicateName { name: String },
}

impl std::fmt::Display for RowDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowDataError::MissingCell { column } => write!(f, "empty {} cell", column),
            RowDataError::InvalidCell {
                column,
                value,
                reason,
            } => write!(f, "invalid {} '{}': {}", column, value, reason),
            RowDataError::OrphanContinuation => {
                write!(f, "attribute row appears before any toll header")
            }
            RowDataError::DuplicateName { name } => {
                write!(f, "\"{}\" is already used by an earlier row", name)
            }
        }
    }
}

impl std::error::Error for RowDataError {}

/// A skipped row or write, located by its spreadsheet row number
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncIssue {
    /// The row was skipped
    RowData {
        sheet: String,
        row: usize,
        error: RowDataError,
    },
    /// A name did not resolve to a node; the dependent write was skipped
    ReferenceNotFound {
        sheet: String,
        row: usize,
        label: Label,
        name: String,
    },
}

impl SyncIssue {
    pub fn row(&self) -> usize {
        match self {
            SyncIssue::RowData { row, .. } | SyncIssue::ReferenceNotFound { row, .. } => *row,
        }
    }
}

impl std::fmt::Display for SyncIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncIssue::RowData { sheet, row, error } => {
                write!(f, "{} row {}: {}", sheet, row, error)
            }
            SyncIssue::ReferenceNotFound {
                sheet,
                row,
                label,
                name,
            } => write!(f, "{} row {}: {} \"{}\" not found", sheet, row, label, name),
        }
    }
}
