//! CLI argument definitions for Roost.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use clap::{Parser, Subcommand};

/// Roost -- IoT device provisioning and runtime.
#[derive(Parser)]
#[command(
    name = "roost",
    version,
    about = "Roost -- provision and run IoT devices against the Roost backend",
    long_about = "Provision this device with a long-lived credential via an interactive \
                  browser login, then run it unattended: at every boot the stored \
                  credential is exchanged for a short-lived session token."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision this device: interactive browser login, then credential
    /// storage. Re-run with --device-id to rotate an existing device's
    /// credential.
    Setup {
        /// Display name for the device (1-50 characters).
        #[arg(long, short)]
        name: String,

        /// Existing device id to re-authenticate instead of registering a
        /// new device.
        #[arg(long)]
        device_id: Option<String>,
    },

    /// Boot the device runtime: load the stored credential and obtain a
    /// fresh session token.
    Run,

    /// Show whether this device is provisioned, and as what.
    Status,

    /// Remove the locally stored credential.
    Logout,
}
