//! CLI entry point for Roost.
//!
//! This binary provides the `roost` command with subcommands for
//! provisioning the device, booting the runtime, and inspecting or
//! clearing the stored credential.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod setup;

use cli::{Cli, Commands};
use config::ClientConfig;
use roost_device::{CredentialStore, DeviceSession, FileCredentialStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Setup { name, device_id } => cmd_setup(&name, device_id.as_deref()).await,
        Commands::Run => cmd_run().await,
        Commands::Status => cmd_status(),
        Commands::Logout => cmd_logout(),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// The credential store at its configured (or conventional) location.
fn credential_store(config: Option<&ClientConfig>) -> Result<FileCredentialStore> {
    let path = match config.and_then(|c| c.credential_path.clone()) {
        Some(path) => path,
        None => FileCredentialStore::default_path()
            .context("cannot determine the credential file location")?,
    };
    Ok(FileCredentialStore::new(path))
}

// ---------------------------------------------------------------------------
// Subcommand: setup
// ---------------------------------------------------------------------------

async fn cmd_setup(name: &str, device_id: Option<&str>) -> Result<()> {
    let config = ClientConfig::from_env()?;
    let store = credential_store(Some(&config))?;

    setup::run_setup(&config, &store, name, device_id).await
}

// ---------------------------------------------------------------------------
// Subcommand: run
// ---------------------------------------------------------------------------

async fn cmd_run() -> Result<()> {
    let config = ClientConfig::from_env()?;
    let store = credential_store(Some(&config))?;

    // The session is constructed exactly once, here, from the credential
    // file; nothing downstream reloads it.
    let session = DeviceSession::from_store(&store, config.backend_url.clone())?;

    info!(
        device_id = %session.credential().device_id,
        device_name = %session.credential().device_name,
        "booting device runtime"
    );

    let _token = session
        .refresh()
        .await
        .context("device boot failed refreshing the session token")?;

    info!("device online; session token obtained");

    // Telemetry upload and command handling belong to the collaborator
    // seams in roost-device; wiring them up is the runtime binary's job
    // for the target hardware.
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

fn cmd_status() -> Result<()> {
    let config = ClientConfig::from_env().ok();
    let store = credential_store(config.as_ref())?;

    match store.load()? {
        Some(record) => {
            println!("provisioned");
            println!("  device id:   {}", record.device_id);
            println!("  device name: {}", record.device_name);
            println!("  code prefix: {}", &record.auth_code[..8.min(record.auth_code.len())]);
        }
        None => {
            println!("not provisioned — run `roost setup --name <name>`");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: logout
// ---------------------------------------------------------------------------

fn cmd_logout() -> Result<()> {
    let config = ClientConfig::from_env().ok();
    let store = credential_store(config.as_ref())?;

    store.clear()?;
    println!("local credential removed; the backend credential dies at its expiry");
    println!("or on the next re-setup of this device");

    Ok(())
}
