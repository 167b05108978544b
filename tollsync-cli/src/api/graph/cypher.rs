//! Cypher rendering for graph queries and operations

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::{GraphOp, GraphQuery, Label};

/// A parameterized Cypher statement in the shape the HTTP endpoint expects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub statement: String,
    pub parameters: Map<String, Value>,
}

impl Statement {
    fn new(statement: impl Into<String>, parameters: Value) -> Self {
        Self {
            statement: statement.into(),
            parameters: parameters.as_object().cloned().unwrap_or_default(),
        }
    }
}

/// Property key as written in a statement; keys other than plain identifiers are quoted
fn property_key(property: &str) -> String {
    let plain = !property.is_empty()
        && !property.starts_with(|c: char| c.is_ascii_digit())
        && property.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        property.to_string()
    } else {
        format!("`{}`", property.replace('`', "``"))
    }
}

/// Point lookup used by `GraphStore::first`
///
/// The key is inlined so the planner can use a property index.
pub fn first_statement(label: Label, property: &str, value: &str) -> Statement {
    Statement::new(
        format!(
            "MATCH (n:{}) WHERE n.{} = $value RETURN n LIMIT 1",
            label,
            property_key(property)
        ),
        json!({ "value": value }),
    )
}

impl GraphQuery {
    pub fn to_statement(&self) -> Statement {
        match self {
            GraphQuery::PropertyValues { label, property } => {
                let key = property_key(property);
                Statement::new(
                    format!(
                        "MATCH (n:{}) WHERE n.{} IS NOT NULL RETURN n.{} AS value",
                        label, key, key
                    ),
                    json!({}),
                )
            }
            GraphQuery::TagNames { label, uid } => Statement::new(
                format!(
                    "MATCH (a:Attribute)-[:TAGS]->(n:{} {{uid: $uid}}) RETURN a.name AS name",
                    label
                ),
                json!({ "uid": uid }),
            ),
            GraphQuery::OwnerOf { promotion_uid } => Statement::new(
                "MATCH (b:Business)-[:HAS_PROMOTION]->(p:Promotion {uid: $uid}) \
                 RETURN b.uid AS uid, b.name AS name",
                json!({ "uid": promotion_uid }),
            ),
            GraphQuery::ChainEdges { toll_name } => Statement::new(
                "MATCH (t:Toll {name: $tollName})-[r:HAS_TAG]->(a:Attribute) \
                 RETURN a.name AS attribute, r.next_toll AS next_toll, \
                 r.next_toll_name AS next_toll_name",
                json!({ "tollName": toll_name }),
            ),
            GraphQuery::NameMatches { label, pattern } => Statement::new(
                format!(
                    "MATCH (n:{}) WHERE n.name =~ $pattern RETURN n.uid AS uid, n.name AS name",
                    label
                ),
                json!({ "pattern": pattern }),
            ),
        }
    }
}

impl GraphOp {
    pub fn to_statement(&self) -> Statement {
        match self {
            GraphOp::CreateNode { label, properties } => Statement::new(
                format!("CREATE (n:{}) SET n = $props", label),
                json!({ "props": properties }),
            ),
            GraphOp::UpdateNode {
                label,
                uid,
                properties,
            } => Statement::new(
                format!("MATCH (n:{} {{uid: $uid}}) SET n += $props", label),
                json!({ "uid": uid, "props": properties }),
            ),
            GraphOp::DetachDelete { label, uids } => Statement::new(
                format!("MATCH (n:{}) WHERE n.uid IN $uids DETACH DELETE n", label),
                json!({ "uids": uids }),
            ),
            GraphOp::ClearTags { label, uid } => Statement::new(
                format!(
                    "MATCH (:Attribute)-[r:TAGS]->(:{} {{uid: $uid}}) DELETE r",
                    label
                ),
                json!({ "uid": uid }),
            ),
            GraphOp::MergeTag {
                label,
                uid,
                attribute,
            } => Statement::new(
                format!(
                    "MATCH (a:Attribute {{name: $attributeName}}) \
                     MATCH (n:{} {{uid: $uid}}) MERGE (a)-[:TAGS]->(n)",
                    label
                ),
                json!({ "attributeName": attribute, "uid": uid }),
            ),
            GraphOp::ClearOwner { promotion_uid } => Statement::new(
                "MATCH (:Business)-[r:HAS_PROMOTION]->(:Promotion {uid: $uid}) DELETE r",
                json!({ "uid": promotion_uid }),
            ),
            GraphOp::MergeOwner {
                business_uid,
                promotion_uid,
            } => Statement::new(
                "MATCH (b:Business {uid: $businessUid}) MATCH (p:Promotion {uid: $promotionUid}) \
                 MERGE (b)-[:HAS_PROMOTION]->(p)",
                json!({ "businessUid": business_uid, "promotionUid": promotion_uid }),
            ),
            GraphOp::PruneChain { toll_name, keep } => Statement::new(
                "MATCH (t:Toll {name: $tollName})-[r:HAS_TAG]->(a:Attribute) \
                 WHERE NOT a.name IN $attributes DELETE r",
                json!({ "tollName": toll_name, "attributes": keep }),
            ),
            GraphOp::SetChainEdge {
                toll_name,
                attribute,
                next_toll,
                next_toll_name,
            } => Statement::new(
                "MATCH (t:Toll {name: $tollName})-[r:HAS_TAG]->(a:Attribute {name: $attributeName}) \
                 SET r.next_toll = $nextToll, r.next_toll_name = $nextTollName",
                json!({
                    "tollName": toll_name,
                    "attributeName": attribute,
                    "nextToll": next_toll,
                    "nextTollName": next_toll_name,
                }),
            ),
            // The payload goes in SET, not in the MERGE pattern, so a changed payload
            // never yields a second edge
            GraphOp::MergeChainEdge {
                toll_name,
                attribute,
                next_toll,
                next_toll_name,
            } => Statement::new(
                "MATCH (t:Toll {name: $tollName}), (a:Attribute {name: $attributeName}) \
                 MERGE (t)-[r:HAS_TAG]->(a) \
                 SET r.next_toll = $nextToll, r.next_toll_name = $nextTollName",
                json!({
                    "tollName": toll_name,
                    "attributeName": attribute,
                    "nextToll": next_toll,
                    "nextTollName": next_toll_name,
                }),
            ),
        }
    }
}
