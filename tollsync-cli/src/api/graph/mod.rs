//! Graph store access
//!
//! Reads are typed [`GraphQuery`] values and writes are typed [`GraphOp`] values. Both
//! render to parameterized Cypher for the Neo4j client; in-memory doubles interpret
//! them directly.

pub mod client;
pub mod cypher;
pub mod operation;
pub mod query;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use client::Neo4jClient;
pub use cypher::Statement;
pub use operation::{GraphOp, OpKind};
pub use query::{ChainEdge, GraphQuery, NamedNode};

/// One result row, keyed by the query's return columns
pub type Record = Map<String, Value>;

/// Node labels the reconciler manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Attribute,
    Business,
    Promotion,
    Road,
    Toll,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Attribute => "Attribute",
            Label::Business => "Business",
            Label::Promotion => "Promotion",
            Label::Road => "Road",
            Label::Toll => "Toll",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Relationship types between managed nodes
pub mod rel {
    /// (:Attribute)-[:TAGS]->(:Business|:Promotion)
    pub const TAGS: &str = "TAGS";
    /// (:Business)-[:HAS_PROMOTION]->(:Promotion)
    pub const HAS_PROMOTION: &str = "HAS_PROMOTION";
    /// (:Toll)-[:HAS_TAG {next_toll, next_toll_name}]->(:Attribute)
    pub const HAS_TAG: &str = "HAS_TAG";
}

/// Property bag of a node as returned by the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub properties: Map<String, Value>,
}

impl Node {
    pub fn new(properties: Map<String, Value>) -> Self {
        Self { properties }
    }

    /// String property, None when absent or not a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn uid(&self) -> Option<&str> {
        self.get_str("uid")
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }
}

/// Point lookups, pattern queries and batched writes against the graph
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// First node with `label` whose `property` equals `value`
    async fn first(&self, label: Label, property: &str, value: &str) -> Result<Option<Node>>;

    /// Run a read query and return its records in order
    async fn query(&self, query: &GraphQuery) -> Result<Vec<Record>>;

    /// Apply all operations, in order, before returning
    async fn batch(&self, ops: &[GraphOp]) -> Result<()>;
}
