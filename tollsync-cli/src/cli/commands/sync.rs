//! Sync command handler

use anyhow::{Context, Result};
use colored::*;
use std::time::Instant;

use crate::api::{Neo4jClient, SheetsClient, build_http_client};
use crate::cli::SyncCommands;
use crate::config::Config;
use crate::sync::{Phase, PhaseReport, SyncOptions, SyncReport, SyncRun};

pub async fn handle_sync_command(args: SyncCommands, config: &Config) -> Result<()> {
    config.validate_for_sync()?;

    let http = build_http_client(config.http.timeout())?;
    let sheet = SheetsClient::new(http.clone(), &config.sheets);
    let graph = Neo4jClient::new(http, &config.graph);

    let options = SyncOptions {
        phases: if args.phases.is_empty() {
            Phase::ALL.to_vec()
        } else {
            args.phases
        },
        dry_run: args.dry_run,
    };

    if options.dry_run {
        println!("{}", "Dry run: nothing will be written".yellow());
    }

    let start = Instant::now();
    let report = SyncRun::new(&graph, &sheet, options)
        .execute()
        .await
        .context("Sync failed")?;

    print_report(&report);
    println!("Finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!();
    println!("{}", "Sync summary".bold());
    for phase in &report.phases {
        println!("  {:<12} {}", phase.phase.to_string().cyan(), phase_line(phase));
    }

    let issues: Vec<_> = report.issues().collect();
    if issues.is_empty() {
        println!("{}", "No issues".green());
        return;
    }

    println!();
    println!("{}", format!("{} issues", issues.len()).yellow().bold());
    for issue in issues {
        println!("  {} {}", "!".yellow(), issue);
    }
}

fn phase_line(phase: &PhaseReport) -> String {
    if phase.is_unchanged() {
        return "unchanged".dimmed().to_string();
    }
    format!(
        "{} created, {} updated, {} deleted, {} edges, {} write-backs",
        phase.created.to_string().green(),
        phase.updated.to_string().blue(),
        phase.deleted.to_string().red(),
        phase.edge_ops,
        phase.write_backs
    )
}
