//! Read queries against the graph and their typed results

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Label, Record};

/// Read patterns the reconcilers issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphQuery {
    /// Every value of `property` across nodes of `label` (column `value`)
    PropertyValues { label: Label, property: String },
    /// Names of attributes tagging the node with `uid` (column `name`)
    TagNames { label: Label, uid: String },
    /// The business owning a promotion (columns `uid`, `name`)
    OwnerOf { promotion_uid: String },
    /// Current HAS_TAG edges of a toll
    /// (columns `attribute`, `next_toll`, `next_toll_name`)
    ChainEdges { toll_name: String },
    /// Nodes whose name matches a regular expression (columns `uid`, `name`)
    NameMatches { label: Label, pattern: String },
}

impl GraphQuery {
    /// Return columns, in order
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            GraphQuery::PropertyValues { .. } => &["value"],
            GraphQuery::TagNames { .. } => &["name"],
            GraphQuery::OwnerOf { .. } | GraphQuery::NameMatches { .. } => &["uid", "name"],
            GraphQuery::ChainEdges { .. } => &["attribute", "next_toll", "next_toll_name"],
        }
    }
}

/// A node reduced to its identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedNode {
    pub uid: String,
    pub name: String,
}

/// One HAS_TAG edge as currently stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEdge {
    pub attribute: String,
    pub next_toll: String,
    pub next_toll_name: String,
}

/// String column of a record; null and missing read as empty
pub fn string_column(record: &Record, column: &str) -> String {
    match record.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Decode `value` columns, skipping nulls
pub fn decode_values(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.get("value").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

pub fn decode_names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| string_column(r, "name"))
        .filter(|name| !name.is_empty())
        .collect()
}

pub fn decode_named_nodes(records: &[Record]) -> Result<Vec<NamedNode>> {
    records
        .iter()
        .map(|r| {
            let uid = r
                .get("uid")
                .and_then(Value::as_str)
                .context("Record is missing the uid column")?;
            Ok(NamedNode {
                uid: uid.to_string(),
                name: string_column(r, "name"),
            })
        })
        .collect()
}

pub fn decode_chain_edges(records: &[Record]) -> Vec<ChainEdge> {
    records
        .iter()
        .map(|r| ChainEdge {
            attribute: string_column(r, "attribute"),
            next_toll: string_column(r, "next_toll"),
            next_toll_name: string_column(r, "next_toll_name"),
        })
        .collect()
}
