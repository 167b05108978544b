use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value, json};

use crate::api::graph::{GraphOp, GraphQuery, GraphStore, Label, Node, Record, rel};

struct MemNode {
    id: usize,
    label: Label,
    properties: Map<String, Value>,
}

struct MemEdge {
    kind: &'static str,
    from: usize,
    to: usize,
    properties: Map<String, Value>,
}

#[derive(Default)]
struct GraphState {
    nodes: Vec<MemNode>,
    edges: Vec<MemEdge>,
    next_id: usize,
    batches: usize,
}

impl GraphState {
    fn add_node(&mut self, label: Label, properties: Map<String, Value>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        let properties = properties
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect();
        self.nodes.push(MemNode {
            id,
            label,
            properties,
        });
        id
    }

    fn ids_where(&self, label: Label, property: &str, value: &str) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.label == label && n.properties.get(property) == Some(&json!(value)))
            .map(|n| n.id)
            .collect()
    }

    fn node(&self, id: usize) -> &MemNode {
        self.nodes.iter().find(|n| n.id == id).unwrap()
    }

    fn label_of(&self, id: usize) -> Label {
        self.node(id).label
    }

    fn prop(&self, id: usize, key: &str) -> Value {
        self.node(id)
            .properties
            .get(key)
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn remove_edges(&mut self, keep: impl Fn(&MemEdge, &GraphState) -> bool) {
        let edges = std::mem::take(&mut self.edges);
        let state: &GraphState = self;
        let kept: Vec<MemEdge> = edges.into_iter().filter(|e| keep(e, state)).collect();
        self.edges = kept;
    }

    fn merge_edge(&mut self, kind: &'static str, from: usize, to: usize) -> usize {
        if let Some(pos) = self
            .edges
            .iter()
            .position(|e| e.kind == kind && e.from == from && e.to == to)
        {
            return pos;
        }
        self.edges.push(MemEdge {
            kind,
            from,
            to,
            properties: Map::new(),
        });
        self.edges.len() - 1
    }

    fn apply(&mut self, op: &GraphOp) {
        match op {
            GraphOp::CreateNode { label, properties } => {
                self.add_node(*label, properties.clone());
            }
            GraphOp::UpdateNode {
                label,
                uid,
                properties,
            } => {
                for id in self.ids_where(*label, "uid", uid) {
                    let node = self.nodes.iter_mut().find(|n| n.id == id).unwrap();
                    for (key, value) in properties {
                        if value.is_null() {
                            node.properties.remove(key);
                        } else {
                            node.properties.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            GraphOp::DetachDelete { label, uids } => {
                let doomed: Vec<usize> = self
                    .nodes
                    .iter()
                    .filter(|n| {
                        n.label == *label
                            && n.properties
                                .get("uid")
                                .and_then(Value::as_str)
                                .is_some_and(|uid| uids.iter().any(|u| u == uid))
                    })
                    .map(|n| n.id)
                    .collect();
                self.edges
                    .retain(|e| !doomed.contains(&e.from) && !doomed.contains(&e.to));
                self.nodes.retain(|n| !doomed.contains(&n.id));
            }
            GraphOp::ClearTags { label, uid } => {
                let targets = self.ids_where(*label, "uid", uid);
                self.remove_edges(|e, g| {
                    !(e.kind == rel::TAGS
                        && targets.contains(&e.to)
                        && g.label_of(e.from) == Label::Attribute)
                });
            }
            GraphOp::MergeTag {
                label,
                uid,
                attribute,
            } => {
                let attributes = self.ids_where(Label::Attribute, "name", attribute);
                let targets = self.ids_where(*label, "uid", uid);
                for from in &attributes {
                    for to in &targets {
                        self.merge_edge(rel::TAGS, *from, *to);
                    }
                }
            }
            GraphOp::ClearOwner { promotion_uid } => {
                let targets = self.ids_where(Label::Promotion, "uid", promotion_uid);
                self.remove_edges(|e, g| {
                    !(e.kind == rel::HAS_PROMOTION
                        && targets.contains(&e.to)
                        && g.label_of(e.from) == Label::Business)
                });
            }
            GraphOp::MergeOwner {
                business_uid,
                promotion_uid,
            } => {
                let owners = self.ids_where(Label::Business, "uid", business_uid);
                let targets = self.ids_where(Label::Promotion, "uid", promotion_uid);
                for from in &owners {
                    for to in &targets {
                        self.merge_edge(rel::HAS_PROMOTION, *from, *to);
                    }
                }
            }
            GraphOp::PruneChain { toll_name, keep } => {
                let tolls = self.ids_where(Label::Toll, "name", toll_name);
                self.remove_edges(|e, g| {
                    if e.kind != rel::HAS_TAG || !tolls.contains(&e.from) {
                        return true;
                    }
                    let attribute = g.prop(e.to, "name");
                    keep.iter().any(|k| attribute == json!(k))
                });
            }
            GraphOp::SetChainEdge {
                toll_name,
                attribute,
                next_toll,
                next_toll_name,
            } => {
                let tolls = self.ids_where(Label::Toll, "name", toll_name);
                let attributes = self.ids_where(Label::Attribute, "name", attribute);
                for edge in self.edges.iter_mut().filter(|e| {
                    e.kind == rel::HAS_TAG && tolls.contains(&e.from) && attributes.contains(&e.to)
                }) {
                    edge.properties.insert("next_toll".into(), json!(next_toll));
                    edge.properties
                        .insert("next_toll_name".into(), json!(next_toll_name));
                }
            }
            GraphOp::MergeChainEdge {
                toll_name,
                attribute,
                next_toll,
                next_toll_name,
            } => {
                let tolls = self.ids_where(Label::Toll, "name", toll_name);
                let attributes = self.ids_where(Label::Attribute, "name", attribute);
                for from in &tolls {
                    for to in &attributes {
                        let pos = self.merge_edge(rel::HAS_TAG, *from, *to);
                        let edge = &mut self.edges[pos];
                        edge.properties.insert("next_toll".into(), json!(next_toll));
                        edge.properties
                            .insert("next_toll_name".into(), json!(next_toll_name));
                    }
                }
            }
        }
    }

    fn query(&self, query: &GraphQuery) -> Result<Vec<Record>> {
        let records = match query {
            GraphQuery::PropertyValues { label, property } => self
                .nodes
                .iter()
                .filter(|n| n.label == *label)
                .filter_map(|n| n.properties.get(property))
                .map(|value| record(json!({ "value": value })))
                .collect(),
            GraphQuery::TagNames { label, uid } => {
                let targets = self.ids_where(*label, "uid", uid);
                self.edges
                    .iter()
                    .filter(|e| {
                        e.kind == rel::TAGS
                            && targets.contains(&e.to)
                            && self.label_of(e.from) == Label::Attribute
                    })
                    .map(|e| record(json!({ "name": self.prop(e.from, "name") })))
                    .collect()
            }
            GraphQuery::OwnerOf { promotion_uid } => {
                let targets = self.ids_where(Label::Promotion, "uid", promotion_uid);
                self.edges
                    .iter()
                    .filter(|e| {
                        e.kind == rel::HAS_PROMOTION
                            && targets.contains(&e.to)
                            && self.label_of(e.from) == Label::Business
                    })
                    .map(|e| {
                        record(json!({
                            "uid": self.prop(e.from, "uid"),
                            "name": self.prop(e.from, "name"),
                        }))
                    })
                    .collect()
            }
            GraphQuery::ChainEdges { toll_name } => {
                let tolls = self.ids_where(Label::Toll, "name", toll_name);
                self.edges
                    .iter()
                    .filter(|e| {
                        e.kind == rel::HAS_TAG
                            && tolls.contains(&e.from)
                            && self.label_of(e.to) == Label::Attribute
                    })
                    .map(|e| {
                        record(json!({
                            "attribute": self.prop(e.to, "name"),
                            "next_toll": e.properties.get("next_toll").cloned().unwrap_or(Value::Null),
                            "next_toll_name": e.properties.get("next_toll_name").cloned().unwrap_or(Value::Null),
                        }))
                    })
                    .collect()
            }
            GraphQuery::NameMatches { label, pattern } => {
                let regex = Regex::new(pattern)
                    .with_context(|| format!("Invalid name pattern '{}'", pattern))?;
                self.nodes
                    .iter()
                    .filter(|n| n.label == *label)
                    .filter(|n| {
                        n.properties
                            .get("name")
                            .and_then(Value::as_str)
                            .is_some_and(|name| regex.is_match(name))
                    })
                    .map(|n| {
                        record(json!({
                            "uid": self.prop(n.id, "uid"),
                            "name": self.prop(n.id, "name"),
                        }))
                    })
                    .collect()
            }
        };
        Ok(records)
    }
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Graph held in memory that interprets queries and operations directly
#[derive(Default)]
pub struct MemoryGraph {
    state: Mutex<GraphState>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a node; `properties` must be a JSON object
    pub fn with_node(self, label: Label, properties: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .add_node(label, record(properties));
        self
    }

    /// Seed an edge between the first nodes matching each (label, property, value)
    pub fn with_edge(
        self,
        kind: &'static str,
        from: (Label, &str, &str),
        to: (Label, &str, &str),
        properties: Value,
    ) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let from = state.ids_where(from.0, from.1, from.2)[0];
            let to = state.ids_where(to.0, to.1, to.2)[0];
            let pos = state.merge_edge(kind, from, to);
            state.edges[pos].properties = record(properties);
        }
        self
    }

    /// Properties of every node with `label`, in insertion order
    pub fn nodes(&self, label: Label) -> Vec<Map<String, Value>> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .iter()
            .filter(|n| n.label == label)
            .map(|n| n.properties.clone())
            .collect()
    }

    pub fn node_by_name(&self, label: Label, name: &str) -> Option<Map<String, Value>> {
        self.nodes(label)
            .into_iter()
            .find(|p| p.get("name") == Some(&json!(name)))
    }

    /// Sorted attribute names tagging the node with `uid`
    pub fn tags(&self, label: Label, uid: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state
            .query(&GraphQuery::TagNames {
                label,
                uid: uid.to_string(),
            })
            .unwrap_or_default()
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str).map(str::to_string))
            .collect();
        names.sort();
        names
    }

    /// Uid of the business owning the promotion
    pub fn owner(&self, promotion_uid: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .query(&GraphQuery::OwnerOf {
                promotion_uid: promotion_uid.to_string(),
            })
            .unwrap_or_default()
            .first()
            .and_then(|r| r.get("uid").and_then(Value::as_str).map(str::to_string))
    }

    /// Sorted (attribute, next_toll, next_toll_name) of a toll's HAS_TAG edges
    pub fn chain(&self, toll_name: &str) -> Vec<(String, String, String)> {
        let state = self.state.lock().unwrap();
        let mut edges: Vec<(String, String, String)> = state
            .query(&GraphQuery::ChainEdges {
                toll_name: toll_name.to_string(),
            })
            .unwrap_or_default()
            .iter()
            .map(|r| {
                let get = |k: &str| {
                    r.get(k)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                (get("attribute"), get("next_toll"), get("next_toll_name"))
            })
            .collect();
        edges.sort();
        edges
    }

    pub fn batch_count(&self) -> usize {
        self.state.lock().unwrap().batches
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn first(&self, label: Label, property: &str, value: &str) -> Result<Option<Node>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ids_where(label, property, value)
            .first()
            .map(|id| Node::new(state.node(*id).properties.clone())))
    }

    async fn query(&self, query: &GraphQuery) -> Result<Vec<Record>> {
        self.state.lock().unwrap().query(query)
    }

    async fn batch(&self, ops: &[GraphOp]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for op in ops {
            state.apply(op);
        }
        state.batches += 1;
        Ok(())
    }
}
