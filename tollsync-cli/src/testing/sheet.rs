use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;

use crate::api::sheets::{CellRef, Row, TableRange, TabularSource, ValueWrite};

/// Spreadsheet held in memory; row 1 of every sheet is a header
#[derive(Default)]
pub struct MemorySheet {
    sheets: Mutex<HashMap<String, Vec<Row>>>,
    sheet_ids: HashMap<i64, String>,
    writes: Mutex<Vec<ValueWrite>>,
    inserted_rows: Mutex<Vec<(i64, usize)>>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet with a header row followed by `rows`
    pub fn with_table(self, sheet: &str, rows: Vec<Row>) -> Self {
        let mut all = vec![vec![format!("{} header", sheet)]];
        all.extend(rows);
        self.sheets.lock().unwrap().insert(sheet.to_string(), all);
        self
    }

    pub fn with_sheet_id(mut self, sheet: &str, id: i64) -> Self {
        self.sheet_ids.insert(id, sheet.to_string());
        self.sheets
            .lock()
            .unwrap()
            .entry(sheet.to_string())
            .or_default();
        self
    }

    /// Value of a cell by A1 address, empty when unset
    pub fn cell(&self, address: &str) -> String {
        let cell = CellRef::parse(address).unwrap();
        let sheets = self.sheets.lock().unwrap();
        sheets
            .get(&cell.sheet)
            .and_then(|rows| rows.get(cell.row - 1))
            .and_then(|row| row.get(cell.column))
            .cloned()
            .unwrap_or_default()
    }

    /// Every write received so far
    pub fn writes(&self) -> Vec<ValueWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    pub fn inserted_rows(&self) -> Vec<(i64, usize)> {
        self.inserted_rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl TabularSource for MemorySheet {
    async fn read(&self, range: &TableRange) -> Result<Vec<Row>> {
        let sheets = self.sheets.lock().unwrap();
        let rows = sheets
            .get(&range.sheet)
            .with_context(|| format!("No sheet named {}", range.sheet))?;

        let mut out: Vec<Row> = rows
            .iter()
            .skip(range.first_row - 1)
            .map(|row| {
                let end = match range.last_column {
                    Some(last) => (last + 1).min(row.len()),
                    None => row.len(),
                };
                let mut cells: Row = row
                    .get(range.first_column..end.max(range.first_column))
                    .map(|cells| cells.to_vec())
                    .unwrap_or_default();
                // The API omits trailing empty cells and rows
                while cells.last().is_some_and(|c| c.is_empty()) {
                    cells.pop();
                }
                cells
            })
            .collect();
        while out.last().is_some_and(|row| row.is_empty()) {
            out.pop();
        }
        Ok(out)
    }

    async fn write_batch(&self, writes: Vec<ValueWrite>) -> Result<()> {
        let mut sheets = self.sheets.lock().unwrap();
        for write in &writes {
            let start = CellRef::parse(&write.range)?;
            let Some(rows) = sheets.get_mut(&start.sheet) else {
                bail!("No sheet named {}", start.sheet);
            };
            for (r, values) in write.values.iter().enumerate() {
                let row_index = start.row - 1 + r;
                if rows.len() <= row_index {
                    rows.resize(row_index + 1, Vec::new());
                }
                let row = &mut rows[row_index];
                for (c, value) in values.iter().enumerate() {
                    let column = start.column + c;
                    if row.len() <= column {
                        row.resize(column + 1, String::new());
                    }
                    row[column] = value.clone();
                }
            }
        }
        self.writes.lock().unwrap().extend(writes);
        Ok(())
    }

    async fn insert_blank_row(&self, sheet_id: i64, index: usize) -> Result<()> {
        let name = self
            .sheet_ids
            .get(&sheet_id)
            .with_context(|| format!("No sheet with id {}", sheet_id))?;
        let mut sheets = self.sheets.lock().unwrap();
        let rows = sheets.entry(name.clone()).or_default();
        if rows.len() < index {
            rows.resize(index, Vec::new());
        }
        rows.insert(index, Vec::new());
        self.inserted_rows.lock().unwrap().push((sheet_id, index));
        Ok(())
    }
}
