//! Record-level reconciliation for Attribute, Business, Promotion, Road and Toll rows
//!
//! Each `plan_*` method turns the rows of one table into a [`PhasePlan`]:
//! - rows with a uid that matches a node are updated when a field changed
//! - rows without a uid (or with a stale one) are created and get the new uid written back
//! - nodes whose uid no longer appears in the table are detach-deleted
//!
//! Lookups are issued one at a time in row order; nothing is written until the plan
//! is committed.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::Phase;
use super::issues::{RowDataError, SyncIssue};
use super::plan::{PhasePlan, properties_differ};
use super::schema::{
    self, AttributeRow, BusinessRow, PromotionRow, RoadRow, TableSpec, TollRow,
};
use crate::api::graph::query::{decode_named_nodes, decode_names, decode_values};
use crate::api::graph::{GraphOp, GraphQuery, GraphStore, Label};
use crate::api::sheets::{Row, TableRange, ValueWrite, cell, optional_cell};

/// A parsed row ready to be matched against the graph
#[derive(Debug, Clone)]
pub struct Candidate {
    /// 0-based index within the table's data rows
    pub row_index: usize,
    pub name: String,
    pub uid: Option<String>,
    /// Scalar properties, excluding uid and timestamps
    pub properties: Map<String, Value>,
}

/// The node a row ended up bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub uid: String,
    /// False when the node is created by this plan
    pub existed: bool,
}

/// Mint a new opaque identifier
pub fn mint_uid() -> String {
    Uuid::new_v4().to_string()
}

/// Builds per-table plans against a graph store
pub struct EntityReconciler<'a> {
    graph: &'a dyn GraphStore,
    /// Timestamp written to created/updated columns for this run
    now: String,
}

/// Per-table state threaded through one planning pass
struct Pass {
    spec: TableSpec,
    range: TableRange,
    plan: PhasePlan,
    /// uids of non-empty rows plus every uid resolved by this pass
    keep: HashSet<String>,
    /// Names bound during this pass, for tables matched by name
    adopted: HashMap<String, String>,
}

impl Pass {
    fn new(phase: Phase, spec: TableSpec) -> Result<Self> {
        Ok(Self {
            spec,
            range: spec.table_range()?,
            plan: PhasePlan::new(phase),
            keep: HashSet::new(),
            adopted: HashMap::new(),
        })
    }

    /// Spreadsheet row number of a data row
    fn sheet_row(&self, row_index: usize) -> usize {
        self.range.first_row + row_index
    }

    fn row_error(&mut self, row_index: usize, error: RowDataError) {
        let issue = SyncIssue::RowData {
            sheet: self.range.sheet.clone(),
            row: self.sheet_row(row_index),
            error,
        };
        self.plan.issue(issue);
    }

    fn not_found(&mut self, row_index: usize, label: Label, name: &str) {
        let issue = SyncIssue::ReferenceNotFound {
            sheet: self.range.sheet.clone(),
            row: self.sheet_row(row_index),
            label,
            name: name.to_string(),
        };
        self.plan.issue(issue);
    }

    /// A row that names an entity but failed to parse is not an orphan
    fn keep_unparsed(&mut self, row: &[String], name_column: usize) {
        if cell(row, name_column).is_empty() {
            return;
        }
        if let Some(uid) = optional_cell(row, self.spec.uid_column) {
            self.keep.insert(uid);
        }
    }

    fn write_back(&mut self, column: usize, row_index: usize, value: &str) {
        let target = self.range.cell(column, row_index);
        self.plan.push_write(ValueWrite::cell(target, value));
    }
}

impl<'a> EntityReconciler<'a> {
    pub fn new(graph: &'a dyn GraphStore, now: impl Into<String>) -> Self {
        Self {
            graph,
            now: now.into(),
        }
    }

    pub async fn plan_attributes(&self, rows: &[Row]) -> Result<PhasePlan> {
        let mut pass = Pass::new(Phase::Attributes, schema::ATTRIBUTES)?;

        for (i, row) in rows.iter().enumerate() {
            let parsed = match AttributeRow::parse(row) {
                Ok(parsed) => parsed,
                Err(e) => {
                    pass.keep_unparsed(row, schema::attribute_columns::NAME);
                    pass.row_error(i, e);
                    continue;
                }
            };
            let candidate = Candidate {
                row_index: i,
                name: parsed.name.clone(),
                uid: parsed.uid.clone(),
                properties: parsed.properties(),
            };
            self.resolve_node(&mut pass, candidate).await?;
        }

        self.prune_orphans(&mut pass).await?;
        Ok(pass.plan)
    }

    /// Toll nodes from run header rows; continuation rows belong to the chain pass
    pub async fn plan_tolls(&self, rows: &[Row]) -> Result<PhasePlan> {
        let mut pass = Pass::new(Phase::Tolls, schema::TOLLS)?;
        let mut seen = HashSet::new();

        for (i, row) in rows.iter().enumerate() {
            let parsed = TollRow::parse(row);
            let (Some(name), Some(properties)) = (parsed.toll.clone(), parsed.properties())
            else {
                continue;
            };
            // Toll names key the chain edges; a repeated header would create a second node
            if !seen.insert(name.clone()) {
                pass.row_error(i, RowDataError::DuplicateName { name });
                continue;
            }
            let candidate = Candidate {
                row_index: i,
                name,
                uid: parsed.uid.clone(),
                properties,
            };
            self.resolve_node(&mut pass, candidate).await?;
        }

        self.prune_orphans(&mut pass).await?;
        Ok(pass.plan)
    }

    pub async fn plan_businesses(&self, rows: &[Row]) -> Result<PhasePlan> {
        let mut pass = Pass::new(Phase::Businesses, schema::BUSINESSES)?;
        let known_attributes = self.known_attributes().await?;

        for (i, row) in rows.iter().enumerate() {
            let parsed = match BusinessRow::parse(row) {
                Ok(parsed) => parsed,
                Err(e) => {
                    pass.keep_unparsed(row, schema::business_columns::NAME);
                    pass.row_error(i, e);
                    continue;
                }
            };
            let candidate = Candidate {
                row_index: i,
                name: parsed.name.clone(),
                uid: parsed.uid.clone(),
                properties: parsed.properties(),
            };
            let resolved = self.resolve_node(&mut pass, candidate).await?;
            self.sync_tags(&mut pass, i, &resolved, &parsed.attributes, &known_attributes)
                .await?;
        }

        self.prune_orphans(&mut pass).await?;
        Ok(pass.plan)
    }

    pub async fn plan_promotions(&self, rows: &[Row]) -> Result<PhasePlan> {
        let mut pass = Pass::new(Phase::Promotions, schema::PROMOTIONS)?;
        let known_attributes = self.known_attributes().await?;

        for (i, row) in rows.iter().enumerate() {
            let parsed = match PromotionRow::parse(row) {
                Ok(parsed) => parsed,
                Err(e) => {
                    pass.keep_unparsed(row, schema::promotion_columns::NAME);
                    pass.row_error(i, e);
                    continue;
                }
            };
            let candidate = Candidate {
                row_index: i,
                name: parsed.name.clone(),
                uid: parsed.uid.clone(),
                properties: parsed.properties(),
            };
            let resolved = self.resolve_node(&mut pass, candidate).await?;

            // Owning business; a missing one skips only the edge
            match self.graph.first(Label::Business, "name", &parsed.business).await? {
                Some(business) => match business.uid() {
                    Some(business_uid) => {
                        self.sync_owner(&mut pass, &resolved, business_uid).await?
                    }
                    None => pass.not_found(i, Label::Business, &parsed.business),
                },
                None => pass.not_found(i, Label::Business, &parsed.business),
            }

            self.sync_tags(&mut pass, i, &resolved, &parsed.attributes, &known_attributes)
                .await?;
        }

        self.prune_orphans(&mut pass).await?;
        Ok(pass.plan)
    }

    /// Roads denormalize their next toll's uid and name
    pub async fn plan_roads(&self, rows: &[Row]) -> Result<PhasePlan> {
        let mut pass = Pass::new(Phase::Roads, schema::ROADS)?;

        for (i, row) in rows.iter().enumerate() {
            let parsed = match RoadRow::parse(row) {
                Ok(parsed) => parsed,
                Err(e) => {
                    pass.keep_unparsed(row, schema::road_columns::NAME);
                    pass.row_error(i, e);
                    continue;
                }
            };

            let next_toll = self.graph.first(Label::Toll, "name", &parsed.next_toll).await?;
            let Some((toll_uid, toll_name)) = next_toll
                .as_ref()
                .and_then(|node| Some((node.uid()?.to_string(), node.name()?.to_string())))
            else {
                if let Some(uid) = &parsed.uid {
                    pass.keep.insert(uid.clone());
                }
                pass.not_found(i, Label::Toll, &parsed.next_toll);
                continue;
            };

            let mut properties = Map::new();
            properties.insert("name".into(), json!(parsed.name));
            properties.insert("next_toll".into(), json!(toll_uid));
            properties.insert("next_toll_name".into(), json!(toll_name));

            let candidate = Candidate {
                row_index: i,
                name: parsed.name.clone(),
                uid: parsed.uid.clone(),
                properties,
            };
            self.resolve_node(&mut pass, candidate).await?;
        }

        self.prune_orphans(&mut pass).await?;
        Ok(pass.plan)
    }

    /// Bind a row to a node: update it, adopt it by name, or create it
    async fn resolve_node(&self, pass: &mut Pass, candidate: Candidate) -> Result<Resolved> {
        let label = pass.spec.label;
        let row_index = candidate.row_index;

        if let Some(uid) = &candidate.uid {
            pass.keep.insert(uid.clone());

            if let Some(node) = self.graph.first(label, "uid", uid).await? {
                if properties_differ(&candidate.properties, &node.properties) {
                    log::debug!("Updating {} \"{}\" ({})", label, candidate.name, uid);
                    let mut properties = candidate.properties;
                    if let Some(column) = pass.spec.updated_column {
                        properties.insert("updated_at".into(), json!(self.now));
                        pass.write_back(column, row_index, &self.now);
                    }
                    pass.plan.push_op(GraphOp::update(label, uid.clone(), properties));
                } else {
                    log::debug!("{} \"{}\" unchanged", label, candidate.name);
                }
                return Ok(Resolved {
                    uid: uid.clone(),
                    existed: true,
                });
            }

            log::warn!(
                "{} \"{}\" has uid {} but no node exists, recreating",
                label,
                candidate.name,
                uid
            );
        }

        if pass.spec.adopt_by_name {
            if let Some(uid) = self.adopt(pass, &candidate).await? {
                return Ok(Resolved { uid, existed: true });
            }
        }

        let uid = mint_uid();
        log::debug!("Creating {} \"{}\" ({})", label, candidate.name, uid);

        let mut properties = candidate.properties;
        properties.insert("uid".into(), json!(uid));
        if pass.spec.has_timestamps() {
            properties.insert("created_at".into(), json!(self.now));
            properties.insert("updated_at".into(), json!(self.now));
        }
        pass.plan.push_op(GraphOp::create(label, properties));

        pass.write_back(pass.spec.uid_column, row_index, &uid);
        if let Some(column) = pass.spec.created_column {
            pass.write_back(column, row_index, &self.now);
        }
        if let Some(column) = pass.spec.updated_column {
            pass.write_back(column, row_index, &self.now);
        }

        pass.keep.insert(uid.clone());
        if pass.spec.adopt_by_name {
            pass.adopted.insert(candidate.name, uid.clone());
        }
        Ok(Resolved {
            uid,
            existed: false,
        })
    }

    /// Reuse the uid of a node that already carries this row's name
    async fn adopt(&self, pass: &mut Pass, candidate: &Candidate) -> Result<Option<String>> {
        let uid = match pass.adopted.get(&candidate.name) {
            Some(uid) => Some(uid.clone()),
            None => self
                .graph
                .first(pass.spec.label, "name", &candidate.name)
                .await?
                .and_then(|node| node.uid().map(str::to_string)),
        };

        let Some(uid) = uid else {
            return Ok(None);
        };

        log::debug!(
            "Adopting existing {} \"{}\" ({})",
            pass.spec.label,
            candidate.name,
            uid
        );
        pass.write_back(pass.spec.uid_column, candidate.row_index, &uid);
        pass.keep.insert(uid.clone());
        pass.adopted.insert(candidate.name.clone(), uid.clone());
        Ok(Some(uid))
    }

    /// Detach-delete every node of the table's label not kept by this pass
    ///
    /// The delete is placed first in the batch.
    async fn prune_orphans(&self, pass: &mut Pass) -> Result<()> {
        let label = pass.spec.label;
        let records = self
            .graph
            .query(&GraphQuery::PropertyValues {
                label,
                property: "uid".into(),
            })
            .await?;

        let mut orphans: Vec<String> = decode_values(&records)
            .into_iter()
            .filter(|uid| !pass.keep.contains(uid))
            .collect();
        orphans.sort();
        orphans.dedup();

        if orphans.is_empty() {
            return Ok(());
        }

        log::info!("Pruning {} orphaned {} nodes", orphans.len(), label);
        let op = GraphOp::detach_delete(label, orphans);
        log::debug!("[{}] {}", pass.plan.phase, op.describe());
        pass.plan.ops.insert(0, op);
        Ok(())
    }

    async fn known_attributes(&self) -> Result<HashSet<String>> {
        let records = self
            .graph
            .query(&GraphQuery::PropertyValues {
                label: Label::Attribute,
                property: "name".into(),
            })
            .await?;
        Ok(decode_values(&records).into_iter().collect())
    }

    /// Replace the node's TAGS set when it differs from the row's list
    ///
    /// The whole set is rewritten (delete all, merge each) rather than diffed edge by edge.
    async fn sync_tags(
        &self,
        pass: &mut Pass,
        row_index: usize,
        resolved: &Resolved,
        names: &[String],
        known_attributes: &HashSet<String>,
    ) -> Result<()> {
        let label = pass.spec.label;

        let mut desired = Vec::new();
        for name in names {
            if known_attributes.contains(name) {
                desired.push(name.clone());
            } else {
                pass.not_found(row_index, Label::Attribute, name);
            }
        }

        if resolved.existed {
            let records = self
                .graph
                .query(&GraphQuery::TagNames {
                    label,
                    uid: resolved.uid.clone(),
                })
                .await?;
            let current: HashSet<String> = decode_names(&records).into_iter().collect();
            let wanted: HashSet<String> = desired.iter().cloned().collect();
            if current == wanted {
                return Ok(());
            }
        } else if desired.is_empty() {
            return Ok(());
        }

        log::debug!("Tagging {} {} with [{}]", label, resolved.uid, desired.join(", "));
        pass.plan.push_op(GraphOp::ClearTags {
            label,
            uid: resolved.uid.clone(),
        });
        for attribute in desired {
            pass.plan.push_op(GraphOp::MergeTag {
                label,
                uid: resolved.uid.clone(),
                attribute,
            });
        }
        Ok(())
    }

    /// Point the promotion's HAS_PROMOTION edge at `business_uid`
    async fn sync_owner(&self, pass: &mut Pass, resolved: &Resolved, business_uid: &str) -> Result<()> {
        if resolved.existed {
            let records = self
                .graph
                .query(&GraphQuery::OwnerOf {
                    promotion_uid: resolved.uid.clone(),
                })
                .await?;
            let owners = decode_named_nodes(&records)?;
            if owners.len() == 1 && owners[0].uid == business_uid {
                return Ok(());
            }
            pass.plan.push_op(GraphOp::ClearOwner {
                promotion_uid: resolved.uid.clone(),
            });
        }

        pass.plan.push_op(GraphOp::MergeOwner {
            business_uid: business_uid.to_string(),
            promotion_uid: resolved.uid.clone(),
        });
        Ok(())
    }
}
