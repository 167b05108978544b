//! Toll decision chains
//!
//! The tolls table stores, per toll, an ordered list of (attribute, next toll) edges
//! using a run-length layout: a row with a toll name starts a run, and every following
//! row with an empty toll column belongs to that run.
//!
//! ```text
//! toll | attribute | next toll
//! A    |           |            <- header, no edge of its own
//!      | x         | T2         <- A -[x]-> T2
//!      | y         |            <- A -[y]-> (end)
//! B    | z         | T1         <- header row carrying an edge
//! ```
//!
//! Each run becomes `HAS_TAG` edges from the toll to its attributes, carrying the next
//! toll's uid and name. Edges to attributes no longer listed are pruned per toll.

use std::collections::HashSet;

use anyhow::Result;

use super::Phase;
use super::issues::{RowDataError, SyncIssue};
use super::plan::PhasePlan;
use super::schema::{self, TollRow};
use crate::api::graph::query::{decode_chain_edges, decode_values};
use crate::api::graph::{GraphOp, GraphQuery, GraphStore, Label};
use crate::api::sheets::{Row, TableRange};

/// The three cells of a tolls row the chain pass reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainRow {
    pub toll: Option<String>,
    pub attribute: Option<String>,
    pub next_toll: Option<String>,
}

impl From<&TollRow> for ChainRow {
    fn from(row: &TollRow) -> Self {
        Self {
            toll: row.toll.clone(),
            attribute: row.attribute.clone(),
            next_toll: row.next_toll.clone(),
        }
    }
}

/// One decision edge of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStep {
    /// 0-based data row the edge came from
    pub row_index: usize,
    pub attribute: String,
    pub next_toll: Option<String>,
}

/// A toll header and the rows that follow it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TollRun {
    pub toll: String,
    pub header_row: usize,
    /// Number of rows consumed, header included
    pub row_count: usize,
    pub steps: Vec<ChainStep>,
}

impl TollRun {
    /// Every attribute named in the run, first occurrence order, without repeats
    pub fn attribute_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .filter(|step| seen.insert(step.attribute.as_str()))
            .map(|step| step.attribute.clone())
            .collect()
    }
}

/// Result of segmenting the tolls table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedChains {
    pub runs: Vec<TollRun>,
    /// Continuation rows found before any header
    pub orphan_rows: Vec<usize>,
    /// Header rows naming a toll an earlier run already claimed; their runs are dropped
    pub repeated_headers: Vec<(usize, String)>,
}

/// True when the row after `index` continues the run `index` belongs to
///
/// The run ends at the last row or right before the next toll header.
pub fn continues_run(rows: &[ChainRow], index: usize) -> bool {
    rows.get(index + 1).is_some_and(|next| next.toll.is_none())
}

/// Split rows into runs
///
/// Only the first run of a toll is kept; later runs under the same name are skipped
/// whole and listed in `repeated_headers`.
pub fn parse_runs(rows: &[ChainRow]) -> ParsedChains {
    let mut parsed = ParsedChains::default();
    let mut seen = HashSet::new();
    let mut i = 0;

    while i < rows.len() {
        let Some(toll) = rows[i].toll.clone() else {
            parsed.orphan_rows.push(i);
            i += 1;
            continue;
        };

        let mut run = TollRun {
            toll,
            header_row: i,
            row_count: 0,
            steps: Vec::new(),
        };

        let mut k = 0;
        loop {
            let row = &rows[i + k];
            if let Some(attribute) = &row.attribute {
                run.steps.push(ChainStep {
                    row_index: i + k,
                    attribute: attribute.clone(),
                    next_toll: row.next_toll.clone(),
                });
            }
            if !continues_run(rows, i + k) {
                break;
            }
            k += 1;
        }

        run.row_count = k + 1;
        i += run.row_count;
        if seen.insert(run.toll.clone()) {
            parsed.runs.push(run);
        } else {
            parsed.repeated_headers.push((run.header_row, run.toll));
        }
    }

    parsed
}

/// Parse raw table rows straight into runs
pub fn parse_table(rows: &[Row]) -> ParsedChains {
    let chain_rows: Vec<ChainRow> = rows
        .iter()
        .map(|row| ChainRow::from(&TollRow::parse(row)))
        .collect();
    parse_runs(&chain_rows)
}

/// Plans the HAS_TAG edges of one toll run at a time
pub struct ChainReconciler<'a> {
    graph: &'a dyn GraphStore,
    range: TableRange,
    /// Tolls an uncommitted (dry run) tolls phase would create
    pending_tolls: HashSet<String>,
}

impl<'a> ChainReconciler<'a> {
    pub fn new(graph: &'a dyn GraphStore) -> Result<Self> {
        Ok(Self {
            graph,
            range: schema::TOLLS.table_range()?,
            pending_tolls: HashSet::new(),
        })
    }

    /// Treat these toll names as existing-to-be rather than missing
    pub fn with_pending_tolls(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.pending_tolls.extend(names);
        self
    }

    /// Issues for rows the segmentation had to skip
    pub fn skipped_plan(&self, parsed: &ParsedChains) -> PhasePlan {
        let mut plan = PhasePlan::new(Phase::Chains);
        for &row_index in &parsed.orphan_rows {
            plan.issue(self.row_error(row_index, RowDataError::OrphanContinuation));
        }
        for (row_index, name) in &parsed.repeated_headers {
            let error = RowDataError::DuplicateName { name: name.clone() };
            plan.issue(self.row_error(*row_index, error));
        }
        plan
    }

    fn row_error(&self, row_index: usize, error: RowDataError) -> SyncIssue {
        SyncIssue::RowData {
            sheet: self.range.sheet.clone(),
            row: self.range.first_row + row_index,
            error,
        }
    }

    /// Names of every Attribute node, to report edges that cannot be created
    pub async fn known_attributes(&self) -> Result<HashSet<String>> {
        let records = self
            .graph
            .query(&GraphQuery::PropertyValues {
                label: Label::Attribute,
                property: "name".into(),
            })
            .await?;
        Ok(decode_values(&records).into_iter().collect())
    }

    /// Prune stale edges, then create or update the run's edges
    pub async fn plan_run(
        &self,
        run: &TollRun,
        known_attributes: &HashSet<String>,
    ) -> Result<PhasePlan> {
        let mut plan = PhasePlan::new(Phase::Chains);
        log::debug!("Updating \"{}\" attributes", run.toll);

        if self.graph.first(Label::Toll, "name", &run.toll).await?.is_none() {
            if self.pending_tolls.contains(&run.toll) {
                log::info!(
                    "\"{}\" is not committed yet, its chain is planned on a real run",
                    run.toll
                );
            } else {
                plan.issue(self.not_found(run.header_row, Label::Toll, &run.toll));
            }
            return Ok(plan);
        }

        // The whole run's list, fixed before any prune is issued
        let keep = run.attribute_names();

        let records = self
            .graph
            .query(&GraphQuery::ChainEdges {
                toll_name: run.toll.clone(),
            })
            .await?;
        let existing = decode_chain_edges(&records);

        let stale = existing
            .iter()
            .any(|edge| !keep.iter().any(|name| name == &edge.attribute));
        if stale {
            log::debug!("Pruning orphaned attributes of \"{}\"", run.toll);
            plan.push_op(GraphOp::PruneChain {
                toll_name: run.toll.clone(),
                keep: keep.clone(),
            });
        }

        let mut seen = HashSet::new();
        for step in &run.steps {
            if !seen.insert(step.attribute.as_str()) {
                log::warn!(
                    "\"{}\" lists attribute \"{}\" twice, keeping the first (row {})",
                    run.toll,
                    step.attribute,
                    self.range.first_row + step.row_index
                );
                continue;
            }
            if !known_attributes.contains(&step.attribute) {
                plan.issue(self.not_found(step.row_index, Label::Attribute, &step.attribute));
                continue;
            }

            let (next_toll, next_toll_name) = self.resolve_next_toll(&mut plan, step).await?;

            let current: Vec<_> = existing
                .iter()
                .filter(|edge| edge.attribute == step.attribute)
                .collect();

            if current.is_empty() {
                plan.push_op(GraphOp::MergeChainEdge {
                    toll_name: run.toll.clone(),
                    attribute: step.attribute.clone(),
                    next_toll,
                    next_toll_name,
                });
            } else if current
                .iter()
                .any(|edge| edge.next_toll != next_toll || edge.next_toll_name != next_toll_name)
            {
                plan.push_op(GraphOp::SetChainEdge {
                    toll_name: run.toll.clone(),
                    attribute: step.attribute.clone(),
                    next_toll,
                    next_toll_name,
                });
            }
        }

        Ok(plan)
    }

    /// `(uid, name)` of the step's next toll; empty when none is named or it is unknown
    async fn resolve_next_toll(
        &self,
        plan: &mut PhasePlan,
        step: &ChainStep,
    ) -> Result<(String, String)> {
        let Some(name) = &step.next_toll else {
            return Ok((String::new(), String::new()));
        };

        let node = self.graph.first(Label::Toll, "name", name).await?;
        match node.as_ref().and_then(|n| Some((n.uid()?, n.name()?))) {
            Some((uid, name)) => Ok((uid.to_string(), name.to_string())),
            None if self.pending_tolls.contains(name) => {
                log::debug!("Next toll \"{}\" is not committed yet", name);
                Ok((String::new(), String::new()))
            }
            None => {
                plan.issue(self.not_found(step.row_index, Label::Toll, name));
                Ok((String::new(), String::new()))
            }
        }
    }

    fn not_found(&self, row_index: usize, label: Label, name: &str) -> SyncIssue {
        SyncIssue::ReferenceNotFound {
            sheet: self.range.sheet.clone(),
            row: self.range.first_row + row_index,
            label,
            name: name.to_string(),
        }
    }
}
