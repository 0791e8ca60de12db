//! Prikorm CLI - feeding log and family sync from the terminal

mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "prikorm=info".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Log(command) => commands::log::run_log(command, &db_path).await,
        Commands::Plan(command) => commands::plan::run_plan(command, &db_path).await,
        Commands::Focus(command) => commands::plan::run_focus(command, &db_path).await,
        Commands::Dates(command) => commands::dates::run_dates(command, &db_path).await,
        Commands::Family(command) => commands::family::run_family(command, &db_path).await,
        Commands::Config(command) => commands::config::run_config(command),
        Commands::Sync(command) => commands::sync::run_sync(command, &db_path).await,
        Commands::Export { output } => {
            commands::export::run_export(output.as_deref(), &db_path).await
        }
        Commands::Import { path } => commands::export::run_import(&path, &db_path)
            .await
            .map(|_| ()),
    }
}
