//! Command-line interface

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::sync::Phase;

#[derive(Parser)]
#[command(name = "tollsync")]
#[command(about = "Reconcile the tollsync spreadsheet with the graph")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to <config dir>/tollsync/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log every per-row decision
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile spreadsheet tables into the graph
    Sync(SyncCommands),
    /// Resolve an uploaded image to its business and move it to production
    Upload(UploadCommands),
}

#[derive(clap::Args)]
pub struct SyncCommands {
    /// Only run these phases (repeatable); all phases by default
    #[arg(long = "phase", value_enum)]
    pub phases: Vec<Phase>,

    /// Plan and log changes without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args)]
pub struct UploadCommands {
    /// Object name in the staging bucket
    pub object_name: String,

    /// Resolve the business without moving or recording anything
    #[arg(long)]
    pub dry_run: bool,
}
