//! Per-phase accumulation of graph writes, write-backs and issues

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use super::Phase;
use super::issues::SyncIssue;
use crate::api::graph::{GraphOp, GraphStore, OpKind};
use crate::api::sheets::{TabularSource, ValueWrite};

/// Everything one phase (or one toll run) wants to change
#[derive(Debug, Clone)]
pub struct PhasePlan {
    pub phase: Phase,
    pub ops: Vec<GraphOp>,
    pub writes: Vec<ValueWrite>,
    pub issues: Vec<SyncIssue>,
}

impl PhasePlan {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            ops: Vec::new(),
            writes: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn push_op(&mut self, op: GraphOp) {
        log::debug!("[{}] {}", self.phase, op.describe());
        self.ops.push(op);
    }

    pub fn push_write(&mut self, write: ValueWrite) {
        self.writes.push(write);
    }

    /// Record a skipped row or write
    pub fn issue(&mut self, issue: SyncIssue) {
        log::warn!("[{}] {}", self.phase, issue);
        self.issues.push(issue);
    }

    /// True when committing would change nothing
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.writes.is_empty()
    }

    /// Apply the graph batch, then the write-back batch
    ///
    /// Graph writes go first so a uid is never written back for a node that failed
    /// to persist. Nothing is rolled back if the write-back batch fails.
    pub async fn commit(
        &self,
        graph: &dyn GraphStore,
        sheet: &dyn TabularSource,
        dry_run: bool,
    ) -> Result<()> {
        if dry_run {
            for op in &self.ops {
                log::info!("[{}] (dry run) {}", self.phase, op.describe());
            }
            for write in &self.writes {
                log::info!(
                    "[{}] (dry run) write {} = {:?}",
                    self.phase,
                    write.range,
                    write.values
                );
            }
            return Ok(());
        }

        if !self.ops.is_empty() {
            graph
                .batch(&self.ops)
                .await
                .with_context(|| format!("{} graph batch failed", self.phase))?;
        }
        if !self.writes.is_empty() {
            sheet
                .write_batch(self.writes.clone())
                .await
                .with_context(|| format!("{} spreadsheet write-back failed", self.phase))?;
        }
        Ok(())
    }

    pub fn report(&self) -> PhaseReport {
        let mut report = PhaseReport::new(self.phase);
        report.absorb(self);
        report
    }
}

/// Counts of what a phase changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub created: usize,
    pub updated: usize,
    /// Nodes removed as orphans
    pub deleted: usize,
    pub edge_ops: usize,
    pub write_backs: usize,
    pub issues: Vec<SyncIssue>,
}

impl PhaseReport {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            created: 0,
            updated: 0,
            deleted: 0,
            edge_ops: 0,
            write_backs: 0,
            issues: Vec::new(),
        }
    }

    /// Add a plan's counts (the chain phase commits one plan per toll)
    pub fn absorb(&mut self, plan: &PhasePlan) {
        for op in &plan.ops {
            match op.kind() {
                OpKind::Create => self.created += 1,
                OpKind::Update => self.updated += 1,
                OpKind::Delete => {
                    if let GraphOp::DetachDelete { uids, .. } = op {
                        self.deleted += uids.len();
                    }
                }
                OpKind::Edge => self.edge_ops += 1,
            }
        }
        self.write_backs += plan.writes.len();
        self.issues.extend(plan.issues.iter().cloned());
    }

    pub fn graph_writes(&self) -> usize {
        self.created + self.updated + self.deleted + self.edge_ops
    }

    pub fn is_unchanged(&self) -> bool {
        self.graph_writes() == 0 && self.write_backs == 0
    }
}

/// Summary of a whole run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub phases: Vec<PhaseReport>,
}

impl SyncReport {
    pub fn issues(&self) -> impl Iterator<Item = &SyncIssue> {
        self.phases.iter().flat_map(|p| p.issues.iter())
    }

    pub fn is_unchanged(&self) -> bool {
        self.phases.iter().all(PhaseReport::is_unchanged)
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }
}

/// True when any desired property differs from the node's value
///
/// A null desired value matches an absent property, since setting null removes it.
pub fn properties_differ(desired: &Map<String, Value>, current: &Map<String, Value>) -> bool {
    desired.iter().any(|(key, value)| match (value, current.get(key)) {
        (Value::Null, None) | (Value::Null, Some(Value::Null)) => false,
        (Value::Number(a), Some(Value::Number(b))) => a.as_f64() != b.as_f64(),
        (value, Some(existing)) => value != existing,
        (_, None) => true,
    })
}
