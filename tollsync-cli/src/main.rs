use anyhow::Result;
use clap::Parser;

mod api;
mod cli;
mod config;
mod sync;
mod upload;

#[cfg(test)]
mod testing;

use cli::commands::{handle_sync_command, handle_upload_command};
use cli::{Cli, Commands};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = Config::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Sync(args) => handle_sync_command(args, &config).await,
        Commands::Upload(args) => handle_upload_command(args, &config).await,
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
