//! yomu - command-line client for Yomu sync

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{AuthCommands, Cli, Commands, ConfigCommands};
use crate::commands::auth::{run_auth_complete, run_auth_login, run_auth_logout};
use crate::commands::common::{resolve_config_path, resolve_db_path};
use crate::commands::completions::run_completions;
use crate::commands::config::{run_config_client, run_config_set, run_config_show};
use crate::commands::conflicts::run_conflicts;
use crate::commands::library::{run_progress, run_remove};
use crate::commands::status::run_status;
use crate::commands::sync::{run_sync, SyncMode};
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

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("yomu=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let config_path = resolve_config_path(cli.config);

    match cli.command {
        Commands::Sync => run_sync(SyncMode::Merge, &db_path, &config_path).await?,
        Commands::Pull => run_sync(SyncMode::Pull, &db_path, &config_path).await?,
        Commands::Push => run_sync(SyncMode::Push, &db_path, &config_path).await?,
        Commands::Status { json } => run_status(json, &db_path, &config_path).await?,
        Commands::Conflicts { limit, json } => run_conflicts(limit, json, &db_path).await?,
        Commands::Progress {
            book_id,
            chapter,
            offset,
            snippet,
        } => {
            run_progress(
                &book_id,
                chapter,
                offset,
                snippet.as_deref(),
                &db_path,
                &config_path,
            )
            .await?;
        }
        Commands::Remove { book_id } => run_remove(&book_id, &db_path, &config_path).await?,
        Commands::Config { command } => match command {
            ConfigCommands::Show { json } => run_config_show(json, &db_path, &config_path).await?,
            ConfigCommands::Set(args) => run_config_set(&args, &db_path, &config_path).await?,
            ConfigCommands::Client {
                api_url,
                timeout,
                redirect_uri,
            } => run_config_client(api_url, timeout, redirect_uri, &config_path)?,
        },
        Commands::Auth { command } => match command {
            AuthCommands::Login => run_auth_login(&db_path, &config_path).await?,
            AuthCommands::Complete { redirect } => {
                run_auth_complete(&redirect, &db_path, &config_path).await?;
            }
            AuthCommands::Logout => run_auth_logout(&db_path, &config_path).await?,
        },
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
