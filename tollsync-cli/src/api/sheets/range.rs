//! A1 notation helpers for spreadsheet ranges
//!
//! Tables are addressed as `sheet!A2:G` (open-ended on rows) and single cells as
//! `sheet!B4`. Column indices are 0-based, row numbers are the 1-based numbers the
//! spreadsheet shows.

use anyhow::{Context, Result, bail};

/// A rectangular, row-open-ended region of one sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRange {
    /// Sheet (tab) name
    pub sheet: String,
    /// First column (0-based)
    pub first_column: usize,
    /// Last column (0-based, inclusive). None means open-ended.
    pub last_column: Option<usize>,
    /// Spreadsheet row number of the first data row (1-based)
    pub first_row: usize,
}

/// A single cell address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRef {
    pub sheet: String,
    /// Column (0-based)
    pub column: usize,
    /// Row number (1-based)
    pub row: usize,
}

impl TableRange {
    /// Parse a table range like `tolls!A2:G`
    pub fn parse(range: &str) -> Result<Self> {
        let (sheet, span) = split_sheet(range)?;
        let (start, end) = match span.split_once(':') {
            Some((start, end)) => (start, Some(end)),
            None => (span, None),
        };

        let (first_column, first_row) = split_address(start)
            .with_context(|| format!("Invalid range start in '{}'", range))?;
        let first_row = first_row.unwrap_or(1);

        let last_column = match end {
            Some(end) => {
                let (column, _row) = split_address(end)
                    .with_context(|| format!("Invalid range end in '{}'", range))?;
                if column < first_column {
                    bail!("Range '{}' ends before it starts", range);
                }
                Some(column)
            }
            None => None,
        };

        Ok(Self {
            sheet: sheet.to_string(),
            first_column,
            last_column,
            first_row,
        })
    }

    /// Address of `column` for the data row at `data_index` (0-based within the range)
    ///
    /// With data starting on row 2, data index 0 is spreadsheet row 2.
    pub fn cell(&self, column: usize, data_index: usize) -> String {
        format!(
            "{}!{}{}",
            self.sheet,
            column_letters(column),
            self.first_row + data_index
        )
    }

    /// Number of columns the range spans, when closed
    pub fn width(&self) -> Option<usize> {
        self.last_column.map(|last| last - self.first_column + 1)
    }
}

impl std::fmt::Display for TableRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}!{}{}",
            self.sheet,
            column_letters(self.first_column),
            self.first_row
        )?;
        if let Some(last) = self.last_column {
            write!(f, ":{}", column_letters(last))?;
        }
        Ok(())
    }
}

impl CellRef {
    /// Parse a single cell like `roads!C7`
    pub fn parse(range: &str) -> Result<Self> {
        let (sheet, address) = split_sheet(range)?;
        if address.contains(':') {
            bail!("Expected a single cell, got range '{}'", range);
        }
        let (column, row) =
            split_address(address).with_context(|| format!("Invalid cell '{}'", range))?;
        let row = row.with_context(|| format!("Cell '{}' has no row number", range))?;
        Ok(Self {
            sheet: sheet.to_string(),
            column,
            row,
        })
    }
}

fn split_sheet(range: &str) -> Result<(&str, &str)> {
    let (sheet, span) = range
        .rsplit_once('!')
        .with_context(|| format!("Range '{}' has no sheet name", range))?;
    let sheet = sheet.trim_matches('\'');
    if sheet.is_empty() {
        bail!("Range '{}' has an empty sheet name", range);
    }
    Ok((sheet, span))
}

/// Split `B12` into (1, Some(12)); `B` alone gives (1, None)
fn split_address(address: &str) -> Result<(usize, Option<usize>)> {
    let letters: String = address
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let digits = &address[letters.len()..];

    let column = column_index(&letters)
        .with_context(|| format!("Invalid column letters in '{}'", address))?;
    let row = if digits.is_empty() {
        None
    } else {
        let row: usize = digits
            .parse()
            .with_context(|| format!("Invalid row number in '{}'", address))?;
        if row == 0 {
            bail!("Row numbers start at 1: '{}'", address);
        }
        Some(row)
    };

    Ok((column, row))
}

/// Convert a 0-based column index to letters (0 -> A, 25 -> Z, 26 -> AA)
pub fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

/// Convert column letters to a 0-based index (A -> 0, AA -> 26)
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        index = index * 26 + (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
    }
    Some(index - 1)
}
