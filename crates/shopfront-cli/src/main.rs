//! shopfront CLI - Sync point-of-sale records from the terminal
//!
//! Runs sync passes, shows local state, watches connectivity and manages
//! advisory edit locks for a configured profile.

mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::check::run_check;
use crate::commands::common::CliContext;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::lock::run_lock;
use crate::commands::records::run_records;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "shopfront=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let context = || CliContext::load(profile, cli.settings.as_deref(), cli.db_path.clone());

    match command {
        Commands::Sync { json } => run_sync(&context()?, json).await,
        Commands::Status { json } => run_status(&context()?, json).await,
        Commands::Check => run_check(&context()?).await,
        Commands::Watch { json } => run_watch(&context()?, json).await,
        Commands::Records { collection, json } => {
            run_records(&context()?, &collection, json).await
        }
        Commands::Lock { command } => run_lock(&context()?, command).await,
        Commands::Config { command } => run_config(command, profile),
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}
