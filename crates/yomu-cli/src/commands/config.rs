use std::path::Path;

use serde::Serialize;
use yomu_core::{ClientConfig, SyncConfig};

use crate::cli::ConfigSetArgs;
use crate::commands::common::{connect_service, open_service};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ConfigReport {
    config_path: String,
    client: ClientConfig,
    /// None when the backend could not be reached
    sync: Option<SyncConfig>,
}

pub async fn run_config_show(
    as_json: bool,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let service = open_service(db_path, config_path).await?;
    let client = ClientConfig::load(Some(config_path))?;
    let sync = match connect_service(&service).await {
        Ok(()) => Some(service.config().await),
        Err(error) => {
            tracing::warn!("Could not load synced preferences: {error}");
            None
        }
    };

    let report = ConfigReport {
        config_path: config_path.display().to_string(),
        client,
        sync,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Config file:  {}", report.config_path);
    println!("API URL:      {}", report.client.api_base_url);
    println!("Timeout:      {}s", report.client.request_timeout_secs);
    println!("Redirect URI: {}", report.client.redirect_uri);
    match &report.sync {
        Some(sync) => {
            println!("Progress:     {}", sync.ln_progress);
            println!("Metadata:     {}", sync.ln_metadata);
            println!("Content:      {}", sync.ln_content);
            println!("Files:        {}", sync.ln_files);
            println!("Deletions:    {:?}", sync.deletion_behavior);
            println!("Drive folder: {}", sync.google_drive_folder);
        }
        None => println!("Synced preferences unavailable (not connected)"),
    }
    Ok(())
}

pub async fn run_config_set(
    args: &ConfigSetArgs,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let service = open_service(db_path, config_path).await?;
    connect_service(&service).await?;

    let mut config = service.config().await;
    if !apply_config_args(&mut config, args) {
        return Err(CliError::NothingToSet);
    }
    service.update_config(&config).await?;
    println!("Sync preferences updated");
    Ok(())
}

/// Copy the given flags onto `config`. Returns whether any flag was given.
pub fn apply_config_args(config: &mut SyncConfig, args: &ConfigSetArgs) -> bool {
    let mut changed = false;
    let mut set = |target: &mut bool, value: Option<bool>| {
        if let Some(value) = value {
            *target = value;
            changed = true;
        }
    };
    set(&mut config.ln_progress, args.progress);
    set(&mut config.ln_metadata, args.metadata);
    set(&mut config.ln_content, args.content);
    set(&mut config.ln_files, args.files);
    set(&mut config.sync_on_app_start, args.on_app_start);
    set(&mut config.sync_on_app_resume, args.on_app_resume);
    set(&mut config.sync_on_chapter_read, args.on_chapter_read);
    set(&mut config.sync_on_chapter_open, args.on_chapter_open);

    if let Some(mode) = args.deletions {
        config.deletion_behavior = mode.into();
        changed = true;
    }
    if let Some(folder) = args
        .folder
        .as_deref()
        .map(str::trim)
        .filter(|folder| !folder.is_empty())
    {
        config.google_drive_folder = folder.to_string();
        changed = true;
    }
    changed
}

pub fn run_config_client(
    api_url: Option<String>,
    timeout: Option<u64>,
    redirect_uri: Option<String>,
    config_path: &Path,
) -> Result<(), CliError> {
    let existing = if config_path.exists() {
        ClientConfig::from_file(config_path)?
    } else {
        ClientConfig::default()
    };
    let updated = update_client_config(existing, api_url, timeout, redirect_uri)?;
    updated.save(config_path)?;
    println!("Saved {}", config_path.display());
    Ok(())
}

pub fn update_client_config(
    mut config: ClientConfig,
    api_url: Option<String>,
    timeout: Option<u64>,
    redirect_uri: Option<String>,
) -> Result<ClientConfig, CliError> {
    if let Some(api_url) = api_url {
        config.api_base_url = api_url;
    }
    if let Some(timeout) = timeout {
        config.request_timeout_secs = timeout;
    }
    if let Some(redirect_uri) = redirect_uri {
        config.redirect_uri = redirect_uri;
    }
    // No environment lookups here so overrides never get written to disk.
    Ok(config.with_overrides(|_| None)?)
}
