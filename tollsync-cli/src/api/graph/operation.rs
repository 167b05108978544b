//! Write operations against the graph
//!
//! Each variant is one Cypher statement once rendered. Reconcilers accumulate them
//! into a per-phase batch.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Label;

/// A single write that can be executed individually or in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphOp {
    /// Create a node with all of its properties (uid included)
    CreateNode {
        label: Label,
        properties: Map<String, Value>,
    },
    /// Overwrite scalar properties of the node with `uid`
    UpdateNode {
        label: Label,
        uid: String,
        properties: Map<String, Value>,
    },
    /// Remove the nodes with these uids and all their relationships
    DetachDelete { label: Label, uids: Vec<String> },
    /// Delete every TAGS relationship into the node with `uid`
    ClearTags { label: Label, uid: String },
    /// Merge (:Attribute {name})-[:TAGS]->(node {uid})
    MergeTag {
        label: Label,
        uid: String,
        attribute: String,
    },
    /// Delete every HAS_PROMOTION relationship into the promotion
    ClearOwner { promotion_uid: String },
    /// Merge (:Business {uid})-[:HAS_PROMOTION]->(:Promotion {uid})
    MergeOwner {
        business_uid: String,
        promotion_uid: String,
    },
    /// Delete HAS_TAG edges from the toll to attributes outside `keep`
    PruneChain { toll_name: String, keep: Vec<String> },
    /// Overwrite the payload of an existing HAS_TAG edge
    SetChainEdge {
        toll_name: String,
        attribute: String,
        next_toll: String,
        next_toll_name: String,
    },
    /// Create the HAS_TAG edge if missing, then set its payload
    MergeChainEdge {
        toll_name: String,
        attribute: String,
        next_toll: String,
        next_toll_name: String,
    },
}

/// Coarse classification used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Create,
    Update,
    Delete,
    Edge,
}

impl GraphOp {
    /// Create a new CreateNode operation
    pub fn create(label: Label, properties: Map<String, Value>) -> Self {
        Self::CreateNode { label, properties }
    }

    /// Create a new UpdateNode operation
    pub fn update(label: Label, uid: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self::UpdateNode {
            label,
            uid: uid.into(),
            properties,
        }
    }

    /// Create a new DetachDelete operation
    pub fn detach_delete(label: Label, uids: Vec<String>) -> Self {
        Self::DetachDelete { label, uids }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            GraphOp::CreateNode { .. } => OpKind::Create,
            GraphOp::UpdateNode { .. } => OpKind::Update,
            GraphOp::DetachDelete { .. } => OpKind::Delete,
            GraphOp::ClearTags { .. }
            | GraphOp::MergeTag { .. }
            | GraphOp::ClearOwner { .. }
            | GraphOp::MergeOwner { .. }
            | GraphOp::PruneChain { .. }
            | GraphOp::SetChainEdge { .. }
            | GraphOp::MergeChainEdge { .. } => OpKind::Edge,
        }
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            GraphOp::CreateNode { label, properties } => format!(
                "CREATE {} {}",
                label,
                properties.get("name").and_then(Value::as_str).unwrap_or("?")
            ),
            GraphOp::UpdateNode { label, uid, .. } => format!("UPDATE {} {}", label, uid),
            GraphOp::DetachDelete { label, uids } => {
                format!("DETACH DELETE {} x{}", label, uids.len())
            }
            GraphOp::ClearTags { label, uid } => format!("CLEAR TAGS -> {} {}", label, uid),
            GraphOp::MergeTag {
                label,
                uid,
                attribute,
            } => format!("({})-[:TAGS]->({} {})", attribute, label, uid),
            GraphOp::ClearOwner { promotion_uid } => {
                format!("CLEAR HAS_PROMOTION -> {}", promotion_uid)
            }
            GraphOp::MergeOwner {
                business_uid,
                promotion_uid,
            } => format!("({})-[:HAS_PROMOTION]->({})", business_uid, promotion_uid),
            GraphOp::PruneChain { toll_name, keep } => {
                format!("PRUNE ({})-[:HAS_TAG]-> except {:?}", toll_name, keep)
            }
            GraphOp::SetChainEdge {
                toll_name,
                attribute,
                next_toll_name,
                ..
            } => format!(
                "SET ({})-[:HAS_TAG]->({}) next={}",
                toll_name, attribute, next_toll_name
            ),
            GraphOp::MergeChainEdge {
                toll_name,
                attribute,
                next_toll_name,
                ..
            } => format!(
                "MERGE ({})-[:HAS_TAG]->({}) next={}",
                toll_name, attribute, next_toll_name
            ),
        }
    }
}
