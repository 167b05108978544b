//! Clients for the external collaborators
//!
//! Each collaborator sits behind a trait so reconcilers can run against the real
//! HTTP APIs or against in-memory doubles.

pub mod graph;
pub mod sheets;
pub mod storage;

use anyhow::{Context, Result};
use std::time::Duration;

pub use graph::{GraphOp, GraphQuery, GraphStore, Label, Neo4jClient, Node};
pub use sheets::{SheetsClient, TableRange, TabularSource, ValueWrite};
pub use storage::{GcsClient, ObjectLocation, ObjectStore};

/// Shared HTTP client for all collaborators
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("tollsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}
