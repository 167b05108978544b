//! Orchestration of one sync invocation
//!
//! Phases run strictly one after another. Each phase commits its own graph batch and
//! write-back batch; a failure stops the run but leaves earlier phases committed.
//! Callers must not run two syncs against the same spreadsheet and graph at once.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};

use super::Phase;
use super::chain::{ChainReconciler, parse_table};
use super::entity::EntityReconciler;
use super::plan::{PhaseReport, SyncReport};
use super::schema::{self, TableSpec};
use crate::api::graph::GraphStore;
use crate::api::sheets::{Row, TabularSource};

/// What to run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Phases to run; executed in [`Phase::ALL`] order regardless of this order
    pub phases: Vec<Phase>,
    /// Build and log plans without committing them
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            phases: Phase::ALL.to_vec(),
            dry_run: false,
        }
    }
}

/// A single reconciliation run
pub struct SyncRun<'a> {
    graph: &'a dyn GraphStore,
    sheet: &'a dyn TabularSource,
    options: SyncOptions,
    now: String,
}

impl<'a> SyncRun<'a> {
    pub fn new(graph: &'a dyn GraphStore, sheet: &'a dyn TabularSource, options: SyncOptions) -> Self {
        Self {
            graph,
            sheet,
            options,
            now: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Fix the timestamp written to created/updated columns
    pub fn with_timestamp(mut self, now: impl Into<String>) -> Self {
        self.now = now.into();
        self
    }

    pub async fn execute(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for phase in Phase::ALL {
            if !self.options.phases.contains(&phase) {
                continue;
            }
            log::info!("Reconciling {}", phase);

            let phase_report = self
                .run_phase(phase)
                .await
                .with_context(|| format!("{} phase failed", phase))?;

            log::info!(
                "{}: {} created, {} updated, {} deleted, {} edge writes, {} write-backs, {} issues",
                phase,
                phase_report.created,
                phase_report.updated,
                phase_report.deleted,
                phase_report.edge_ops,
                phase_report.write_backs,
                phase_report.issues.len()
            );
            report.phases.push(phase_report);
        }

        Ok(report)
    }

    async fn run_phase(&self, phase: Phase) -> Result<PhaseReport> {
        let entities = EntityReconciler::new(self.graph, self.now.clone());

        let plan = match phase {
            Phase::Attributes => {
                let rows = self.read(&schema::ATTRIBUTES).await?;
                entities.plan_attributes(&rows).await?
            }
            Phase::Tolls => {
                let rows = self.read(&schema::TOLLS).await?;
                entities.plan_tolls(&rows).await?
            }
            Phase::Businesses => {
                let rows = self.read(&schema::BUSINESSES).await?;
                entities.plan_businesses(&rows).await?
            }
            Phase::Promotions => {
                let rows = self.read(&schema::PROMOTIONS).await?;
                entities.plan_promotions(&rows).await?
            }
            Phase::Roads => {
                let rows = self.read(&schema::ROADS).await?;
                entities.plan_roads(&rows).await?
            }
            Phase::Chains => return self.run_chains().await,
        };

        plan.commit(self.graph, self.sheet, self.options.dry_run)
            .await?;
        Ok(plan.report())
    }

    /// One batch per toll run, so batch count is bounded by the number of tolls
    async fn run_chains(&self) -> Result<PhaseReport> {
        let rows = self.read(&schema::TOLLS).await?;
        let parsed = parse_table(&rows);
        let mut chains = ChainReconciler::new(self.graph)?;
        if self.options.dry_run && self.options.phases.contains(&Phase::Tolls) {
            chains = chains.with_pending_tolls(parsed.runs.iter().map(|run| run.toll.clone()));
        }

        let mut report = PhaseReport::new(Phase::Chains);
        report.absorb(&chains.skipped_plan(&parsed));

        let known_attributes = chains.known_attributes().await?;
        for run in &parsed.runs {
            let plan = chains.plan_run(run, &known_attributes).await?;
            if !plan.is_empty() {
                plan.commit(self.graph, self.sheet, self.options.dry_run)
                    .await
                    .with_context(|| format!("Chain batch for toll \"{}\" failed", run.toll))?;
            }
            report.absorb(&plan);
        }

        Ok(report)
    }

    async fn read(&self, spec: &TableSpec) -> Result<Vec<Row>> {
        let range = spec.table_range()?;
        let rows = self
            .sheet
            .read(&range)
            .await
            .with_context(|| format!("Failed to read {}", range))?;
        log::debug!("Read {} rows from {}", rows.len(), range);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::graph::Label;
    use crate::testing::{MemoryGraph, MemorySheet, row};
    use serde_json::json;

    fn workbook() -> MemorySheet {
        MemorySheet::new()
            .with_table("attributes", vec![row(&["wifi"]), row(&["parking"])])
            .with_table(
                "tolls",
                vec![
                    row(&["A", "single"]),
                    row(&["", "", "wifi", "B"]),
                    row(&["", "", "parking"]),
                    row(&["B", "multi", "wifi", "A"]),
                ],
            )
            .with_table(
                "businesses",
                vec![row(&["Joe's Diner", "Burgers", "wifi, parking"])],
            )
            .with_table(
                "promotions",
                vec![row(&["Half off", "Joe's Diner", "50", "", "wifi"])],
            )
            .with_table("roads", vec![row(&["Main St", "A"])])
    }

    fn uid_of(graph: &MemoryGraph, label: Label, name: &str) -> String {
        graph.node_by_name(label, name).unwrap()["uid"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_full_run_builds_graph_and_second_run_changes_nothing() {
        let graph = MemoryGraph::new();
        let sheet = workbook();

        let report = SyncRun::new(&graph, &sheet, SyncOptions::default())
            .execute()
            .await
            .unwrap();
        assert_eq!(report.issues().count(), 0);
        assert_eq!(report.phase(Phase::Attributes).unwrap().created, 2);
        assert_eq!(report.phase(Phase::Tolls).unwrap().created, 2);

        let a = uid_of(&graph, Label::Toll, "A");
        let b = uid_of(&graph, Label::Toll, "B");
        assert_eq!(
            graph.chain("A"),
            vec![
                ("parking".to_string(), String::new(), String::new()),
                ("wifi".to_string(), b.clone(), "B".to_string()),
            ]
        );
        assert_eq!(
            graph.chain("B"),
            vec![("wifi".to_string(), a.clone(), "A".to_string())]
        );

        let business = uid_of(&graph, Label::Business, "Joe's Diner");
        assert_eq!(graph.tags(Label::Business, &business), vec!["parking", "wifi"]);
        let promotion = uid_of(&graph, Label::Promotion, "Half off");
        assert_eq!(graph.owner(&promotion), Some(business.clone()));
        assert_eq!(sheet.cell("businesses!D2"), business);
        assert_eq!(
            graph.node_by_name(Label::Road, "Main St").unwrap()["next_toll"],
            json!(a)
        );

        let batches = graph.batch_count();
        sheet.clear_writes();
        let again = SyncRun::new(&graph, &sheet, SyncOptions::default())
            .execute()
            .await
            .unwrap();
        assert!(again.is_unchanged(), "second run changed: {:?}", again.phases);
        assert_eq!(graph.batch_count(), batches);
        assert!(sheet.writes().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_commits_nothing() {
        let graph = MemoryGraph::new();
        let sheet = workbook();
        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };

        let report = SyncRun::new(&graph, &sheet, options)
            .execute()
            .await
            .unwrap();

        assert_eq!(report.phase(Phase::Attributes).unwrap().created, 2);
        // tolls the dry run would create are not reported missing by the chains
        assert!(report.phase(Phase::Chains).unwrap().issues.is_empty());
        assert_eq!(graph.batch_count(), 0);
        assert!(sheet.writes().is_empty());
        assert_eq!(sheet.cell("attributes!B2"), "");
    }

    #[tokio::test]
    async fn test_selected_phases_run_in_fixed_order() {
        let graph = MemoryGraph::new();
        let sheet = workbook();
        let options = SyncOptions {
            phases: vec![Phase::Tolls, Phase::Attributes],
            dry_run: false,
        };

        let report = SyncRun::new(&graph, &sheet, options)
            .with_timestamp("2026-01-01T00:00:00.000Z")
            .execute()
            .await
            .unwrap();

        let order: Vec<Phase> = report.phases.iter().map(|p| p.phase).collect();
        assert_eq!(order, vec![Phase::Attributes, Phase::Tolls]);
        assert!(graph.nodes(Label::Business).is_empty());
        assert_eq!(sheet.cell("tolls!F2"), "2026-01-01T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_missing_table_fails_the_phase() {
        let graph = MemoryGraph::new();
        let sheet = MemorySheet::new().with_table("attributes", vec![row(&["wifi"])]);

        let err = SyncRun::new(&graph, &sheet, SyncOptions::default())
            .execute()
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("tolls phase failed"));
        // the attributes phase stays committed
        assert_eq!(graph.nodes(Label::Attribute).len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_toll_header_converges() {
        let graph = MemoryGraph::new();
        let sheet = MemorySheet::new()
            .with_table("attributes", vec![row(&["x"]), row(&["y"]), row(&["z"])])
            .with_table(
                "tolls",
                vec![
                    row(&["A", "single", "x"]),
                    row(&["B", "single", "y"]),
                    row(&["A", "single", "z"]),
                ],
            );
        let options = SyncOptions {
            phases: vec![Phase::Attributes, Phase::Tolls, Phase::Chains],
            dry_run: false,
        };

        let first = SyncRun::new(&graph, &sheet, options.clone())
            .execute()
            .await
            .unwrap();
        assert_eq!(graph.nodes(Label::Toll).len(), 2);
        assert_eq!(
            graph.chain("A"),
            vec![("x".to_string(), String::new(), String::new())]
        );
        assert_eq!(first.phase(Phase::Tolls).unwrap().issues.len(), 1);
        assert_eq!(first.phase(Phase::Chains).unwrap().issues.len(), 1);

        let second = SyncRun::new(&graph, &sheet, options)
            .execute()
            .await
            .unwrap();
        assert!(second.is_unchanged(), "second run changed: {:?}", second.phases);
        assert_eq!(second.issues().count(), 2);
    }
}
