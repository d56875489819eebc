use std::path::Path;

use crate::commands::common::{load_client_config, open_service};
use crate::error::CliError;

pub async fn run_auth_login(db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let client = load_client_config(config_path)?;
    let service = open_service(db_path, config_path).await?;

    let flow = service.start_auth(&client.redirect_uri).await?;
    println!("Open this URL in a browser to connect:");
    println!("{}", flow.auth_url);
    println!();
    println!("Then run `yomu auth complete '<redirect url>'` with the page you land on.");
    Ok(())
}

pub async fn run_auth_complete(
    redirect: &str,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let client = load_client_config(config_path)?;
    let service = open_service(db_path, config_path).await?;

    let auth = service.complete_auth(redirect, &client.redirect_uri).await?;
    match auth.email {
        Some(email) => println!("Connected as {email}"),
        None => println!("Connected"),
    }
    Ok(())
}

pub async fn run_auth_logout(db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path, config_path).await?;
    service.disconnect().await?;
    println!("Disconnected");
    Ok(())
}
