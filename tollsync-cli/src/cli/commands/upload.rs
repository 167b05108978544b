//! Upload command handler

use anyhow::{Context, Result};
use colored::*;

use crate::api::{GcsClient, Neo4jClient, SheetsClient, build_http_client};
use crate::cli::UploadCommands;
use crate::config::Config;
use crate::upload::UploadResolver;

pub async fn handle_upload_command(args: UploadCommands, config: &Config) -> Result<()> {
    config.validate_for_upload()?;

    let http = build_http_client(config.http.timeout())?;
    let sheet = SheetsClient::new(http.clone(), &config.sheets);
    let graph = Neo4jClient::new(http.clone(), &config.graph);
    let store = GcsClient::new(http, &config.storage);

    let resolver = UploadResolver::new(
        &graph,
        &sheet,
        &store,
        config.storage.clone(),
        config.audit.clone(),
    )
    .dry_run(args.dry_run);

    let outcome = resolver
        .handle(&args.object_name)
        .await
        .with_context(|| format!("Upload of '{}' failed", args.object_name))?;

    println!(
        "{} {} -> {} of {} ({})",
        "✓".green(),
        args.object_name.cyan(),
        outcome.variant,
        outcome.business.name.bold(),
        outcome.business.uid.dimmed()
    );
    match &outcome.destination {
        Some(destination) => println!("  stored as {}, recorded in {}", destination, outcome.cell),
        None => println!("  {} would be recorded in {}", "dry run:".yellow(), outcome.cell),
    }
    Ok(())
}
