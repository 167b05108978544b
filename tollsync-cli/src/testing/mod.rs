//! In-memory collaborators for tests

mod graph;
mod sheet;
mod storage;

pub use graph::MemoryGraph;
pub use sheet::MemorySheet;
pub use storage::MemoryObjectStore;

/// Build a row of owned cells
pub fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|s| s.to_string()).collect()
}
